//! Unified task view builder.
//!
//! Converts each source population into [`CanonicalTask`]s and merges them
//! into one recency-ordered sequence.

use std::sync::Arc;

use serde::Serialize;

use crate::source::{
    ArchivedTableRecord, MergeTaskRecord, ScanTaskRecord, SourceTaskRecord, TestTableTaskRecord,
};
use crate::status::TaskStatus;
use crate::task::{CanonicalTask, TaskType, is_archive_or_restore};

/// Progress reported for a merge task that has neither a known phase nor a percentage.
pub const MERGE_PROGRESS_UNKNOWN: u8 = 50;

/// Merge execution phases and the progress checkpoint each one represents.
pub const MERGE_PHASE_PROGRESS: &[(&str, u8)] = &[
    ("initializing", 5),
    ("planning", 15),
    ("reading", 30),
    ("merging", 60),
    ("writing", 80),
    ("committing", 90),
    ("completing", 98),
];

pub fn merge_phase_progress(phase: &str) -> Option<u8> {
    let phase = phase.trim();
    MERGE_PHASE_PROGRESS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(phase))
        .map(|(_, pct)| *pct)
}

fn clamp_progress(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

fn merge_progress(status: &TaskStatus, phase: Option<&str>, reported: Option<f64>) -> u8 {
    match status {
        TaskStatus::Success => 100,
        TaskStatus::Failed => 0,
        _ => phase
            .and_then(merge_phase_progress)
            .or_else(|| reported.map(clamp_progress))
            .unwrap_or(MERGE_PROGRESS_UNKNOWN),
    }
}

pub fn merge_task(record: &Arc<MergeTaskRecord>) -> CanonicalTask {
    let status = TaskStatus::normalize(&record.status);
    let progress = merge_progress(&status, record.phase.as_deref(), record.progress);
    CanonicalTask {
        id: record.id.clone(),
        task_type: TaskType::Merge,
        subtype: None,
        status,
        progress,
        display_name: record.name.clone(),
        database_name: record.database_name.clone(),
        table_name: record.table_name.clone(),
        start_time: record.created_at,
        last_update: record.updated_at.or(record.created_at),
        raw: SourceTaskRecord::Merge(Arc::clone(record)),
    }
}

pub fn test_table_task(record: &Arc<TestTableTaskRecord>) -> CanonicalTask {
    CanonicalTask {
        id: record.id.clone(),
        task_type: TaskType::TestTableGeneration,
        subtype: None,
        status: TaskStatus::normalize(&record.status),
        progress: record.progress.map(clamp_progress).unwrap_or(0),
        display_name: record.table_name.clone(),
        database_name: record.database_name.clone(),
        table_name: record.table_name.clone(),
        start_time: record.created_at,
        last_update: record.updated_at.or(record.created_at),
        raw: SourceTaskRecord::TestTable(Arc::clone(record)),
    }
}

pub fn scan_task(record: &Arc<ScanTaskRecord>) -> CanonicalTask {
    let subtype = is_archive_or_restore(&record.task_type).then(|| record.task_type.clone());
    CanonicalTask {
        id: record.task_id.clone(),
        task_type: TaskType::Scan,
        subtype,
        status: TaskStatus::normalize(&record.state),
        progress: record.progress.map(clamp_progress).unwrap_or(0),
        display_name: Some(record.task_type.clone()),
        database_name: record.target_database.clone(),
        table_name: record.target_table.clone(),
        start_time: record.started_at,
        last_update: record.updated_at.or(record.started_at),
        raw: SourceTaskRecord::Scan(Arc::clone(record)),
    }
}

/// Historical archive actions are finished side effects, never live jobs.
pub fn archive_task(record: &Arc<ArchivedTableRecord>) -> CanonicalTask {
    let id = match record.action_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => id.to_string(),
        None => match record.archived_at {
            Some(at) => format!(
                "archive:{}.{}@{}",
                record.database_name,
                record.table_name,
                at.to_rfc3339()
            ),
            None => format!("archive:{}.{}", record.database_name, record.table_name),
        },
    };
    CanonicalTask {
        id,
        task_type: TaskType::Archive,
        subtype: None,
        status: TaskStatus::Success,
        progress: 100,
        display_name: record.archive_location.clone(),
        database_name: Some(record.database_name.clone()),
        table_name: Some(record.table_name.clone()),
        start_time: record.archived_at,
        last_update: record.archived_at,
        raw: SourceTaskRecord::Archive(Arc::clone(record)),
    }
}

/// Raw records as last fetched, one list per origin.
#[derive(Debug, Clone, Default)]
pub struct RawPopulations {
    pub merge: Vec<Arc<MergeTaskRecord>>,
    pub test_table: Vec<Arc<TestTableTaskRecord>>,
    pub scan: Vec<Arc<ScanTaskRecord>>,
    pub archive: Vec<Arc<ArchivedTableRecord>>,
}

/// The four canonical populations, each in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPopulations {
    pub merge: Vec<CanonicalTask>,
    pub test_table: Vec<CanonicalTask>,
    pub scan: Vec<CanonicalTask>,
    pub archive: Vec<CanonicalTask>,
}

impl TaskPopulations {
    pub fn build(raw: &RawPopulations) -> Self {
        Self {
            merge: raw.merge.iter().map(merge_task).collect(),
            test_table: raw.test_table.iter().map(test_table_task).collect(),
            scan: raw.scan.iter().map(scan_task).collect(),
            archive: raw.archive.iter().map(archive_task).collect(),
        }
    }

    pub fn population(&self, task_type: TaskType) -> &[CanonicalTask] {
        match task_type {
            TaskType::Merge => &self.merge,
            TaskType::TestTableGeneration => &self.test_table,
            TaskType::Scan => &self.scan,
            TaskType::Archive => &self.archive,
        }
    }

    pub fn len(&self) -> usize {
        TaskType::ALL
            .iter()
            .map(|t| self.population(*t).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal that drives the adaptive poller.
    pub fn any_merge_running(&self) -> bool {
        self.merge.iter().any(CanonicalTask::is_running)
    }

    /// All populations concatenated (merge, test-table, scan, archive) and
    /// ordered most recent first.
    pub fn merged(&self) -> Vec<CanonicalTask> {
        let mut out = Vec::with_capacity(self.len());
        for task_type in TaskType::ALL {
            out.extend(self.population(task_type).iter().cloned());
        }
        sort_by_recency(&mut out);
        out
    }
}

/// Stable descending sort on `last_update` (falling back to `start_time`).
/// Tasks without any timestamp sink to the end; exact ties keep their order.
pub fn sort_by_recency(tasks: &mut [CanonicalTask]) {
    tasks.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
}

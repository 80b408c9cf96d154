use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::{ArchivedTableRecord, MergeTaskRecord, ScanTaskRecord, TestTableTaskRecord};

/// Deterministic timestamp `secs` seconds after the Unix epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("valid test timestamp")
}

/// Merge record on `analytics.events` without timestamps.
pub fn merge_record(id: &str, status: &str) -> Arc<MergeTaskRecord> {
    Arc::new(MergeTaskRecord {
        id: id.to_string(),
        status: status.to_string(),
        phase: None,
        progress: None,
        name: None,
        database_name: Some("analytics".to_string()),
        table_name: Some("events".to_string()),
        created_at: None,
        updated_at: None,
    })
}

/// Merge record last updated at `secs`.
pub fn merge_record_at(id: &str, status: &str, secs: i64) -> Arc<MergeTaskRecord> {
    let mut record = merge_record(id, status);
    let inner = Arc::make_mut(&mut record);
    inner.created_at = Some(ts(secs - 1));
    inner.updated_at = Some(ts(secs));
    record
}

pub fn test_table_record(id: &str, status: &str) -> Arc<TestTableTaskRecord> {
    Arc::new(TestTableTaskRecord {
        id: id.to_string(),
        status: status.to_string(),
        progress: None,
        database_name: Some("synthetic".to_string()),
        table_name: Some(format!("{id}_rows")),
        row_count: Some(1_000),
        created_at: None,
        updated_at: None,
    })
}

pub fn test_table_record_at(id: &str, status: &str, secs: i64) -> Arc<TestTableTaskRecord> {
    let mut record = test_table_record(id, status);
    let inner = Arc::make_mut(&mut record);
    inner.created_at = Some(ts(secs - 1));
    inner.updated_at = Some(ts(secs));
    record
}

/// Scan-channel record of kind `task_type` (e.g. `metadata_scan`, `archive_table`).
pub fn scan_record(id: &str, task_type: &str, state: &str) -> Arc<ScanTaskRecord> {
    Arc::new(ScanTaskRecord {
        task_id: id.to_string(),
        task_type: task_type.to_string(),
        state: state.to_string(),
        progress: None,
        target_database: Some("warehouse".to_string()),
        target_table: Some(format!("{id}_target")),
        started_at: None,
        updated_at: None,
    })
}

pub fn scan_record_at(id: &str, task_type: &str, state: &str, secs: i64) -> Arc<ScanTaskRecord> {
    let mut record = scan_record(id, task_type, state);
    let inner = Arc::make_mut(&mut record);
    inner.started_at = Some(ts(secs - 1));
    inner.updated_at = Some(ts(secs));
    record
}

/// Completed archive action archived at `secs`.
pub fn archive_record(database: &str, table: &str, secs: i64) -> Arc<ArchivedTableRecord> {
    Arc::new(ArchivedTableRecord {
        action_id: None,
        database_name: database.to_string(),
        table_name: table.to_string(),
        archive_location: Some(format!("/archive/{database}/{table}")),
        archived_at: Some(ts(secs)),
    })
}

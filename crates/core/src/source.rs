//! Raw records owned by the external job-execution system.
//!
//! Each origin subsystem has its own shape and status vocabulary. They are
//! kept as-is here and only reconciled by the view builder.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Data-merge job, reported by the cluster task endpoint with `type = "merge"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTaskRecord {
    pub id: String,
    pub status: String,
    /// Execution phase, e.g. `planning` or `committing`.
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Synthetic test-table generation job, interleaved with merge tasks
/// (`type = "test_table_generation"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTableTaskRecord {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Metadata scan or archive/restore action surfaced through the scan channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTaskRecord {
    #[serde(alias = "id")]
    pub task_id: String,
    /// Raw scan kind: `metadata_scan`, `archive_table`, `restore_table_policy`, ...
    pub task_type: String,
    #[serde(alias = "status")]
    pub state: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub target_database: Option<String>,
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Completed archive action. There is no live task behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTableRecord {
    #[serde(default)]
    pub action_id: Option<String>,
    pub database_name: String,
    pub table_name: String,
    #[serde(default)]
    pub archive_location: Option<String>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

/// One raw record, tagged by its origin subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceTaskRecord {
    Merge(Arc<MergeTaskRecord>),
    TestTable(Arc<TestTableTaskRecord>),
    Scan(Arc<ScanTaskRecord>),
    Archive(Arc<ArchivedTableRecord>),
}

/// Result of the cluster task fetch: merge and test-table records share one
/// endpoint and are split by their `type` discriminator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTasks {
    pub merge: Vec<MergeTaskRecord>,
    pub test_table: Vec<TestTableTaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
}

/// Fetch collaborator for the four task populations and per-task logs.
pub trait TaskSource: Send + Sync {
    fn fetch_merge_tasks(
        &self,
        cluster_id: &str,
    ) -> impl Future<Output = Result<ClusterTasks>> + Send;

    fn fetch_scan_tasks(
        &self,
        cluster_id: &str,
        status_filter: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ScanTaskRecord>>> + Send;

    fn fetch_archived_tables(
        &self,
        cluster_id: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ArchivedTableRecord>>> + Send;

    fn fetch_task_logs(&self, task_id: &str) -> impl Future<Output = Result<Vec<LogLine>>> + Send;
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceTaskRecord;
use crate::status::TaskStatus;

/// Origin population of a canonical task.
///
/// Variant order is the population concatenation order used for stable
/// sorting: merge, test-table, scan, archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Merge,
    TestTableGeneration,
    Scan,
    Archive,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Merge,
        TaskType::TestTableGeneration,
        TaskType::Scan,
        TaskType::Archive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::TestTableGeneration => "test-table-generation",
            Self::Scan => "scan",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "test-table-generation" | "test_table_generation" | "test-table" => {
                Ok(Self::TestTableGeneration)
            }
            "scan" => Ok(Self::Scan),
            "archive" => Ok(Self::Archive),
            other => Err(format!(
                "unknown task type '{other}' (expected merge, test-table-generation, scan or archive)"
            )),
        }
    }
}

/// True for scan kinds that describe an archive or restore action
/// (`archive_table`, `restore_table_policy`, ...).
pub fn is_archive_or_restore(kind: &str) -> bool {
    kind.starts_with("archive") || kind.starts_with("restore")
}

/// A task from any origin, reconciled into one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Raw scan kind; only set for archive/restore flavoured scan records.
    pub subtype: Option<String>,
    pub status: TaskStatus,
    pub progress: u8,
    pub display_name: Option<String>,
    pub database_name: Option<String>,
    pub table_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub raw: SourceTaskRecord,
}

impl CanonicalTask {
    /// Timestamp used for recency ordering.
    pub fn sort_time(&self) -> Option<DateTime<Utc>> {
        self.last_update.or(self.start_time)
    }

    /// `database.table` when both parts are known, otherwise whichever exists.
    pub fn qualified_table(&self) -> Option<String> {
        match (self.database_name.as_deref(), self.table_name.as_deref()) {
            (Some(db), Some(table)) => Some(format!("{db}.{table}")),
            (None, Some(table)) => Some(table.to_string()),
            (Some(db), None) => Some(db.to_string()),
            (None, None) => None,
        }
    }

    /// Display string matched by the free-text filter: name, then `database.table`.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(2);
        if let Some(name) = self.display_name.as_deref().filter(|s| !s.is_empty()) {
            parts.push(name.to_string());
        }
        if let Some(table) = self.qualified_table() {
            parts.push(table);
        }
        parts.join(" ")
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

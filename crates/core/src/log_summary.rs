//! Structured summaries recovered from free-text job log lines.
//!
//! Long-running archive/restore jobs print lines such as
//! `[task-7] A150 files_moved=42 archive_location=/archive/db/t`. The token
//! after the bracket selects a fixed field set; `key=value` pairs fill it.
//! Values are single whitespace-free tokens.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::status::TaskStatus;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\s+([A-Za-z0-9]+)\s").expect("log code regex should compile"));
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)([^\s=]+)=(\S+)").expect("key=value regex should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    Text,
}

const ARCHIVE_FIELDS: &[(&str, FieldKind)] = &[
    ("files_moved", FieldKind::Number),
    ("archive_location", FieldKind::Text),
];
const POLICY_FIELDS: &[(&str, FieldKind)] = &[
    ("paths_success", FieldKind::Number),
    ("paths_failed", FieldKind::Number),
    ("effective", FieldKind::Text),
];
const RESTORE_FIELDS: &[(&str, FieldKind)] = &[
    ("files_restored", FieldKind::Number),
    ("restored_location", FieldKind::Text),
];

/// Field set carried by a structured log code. Unknown codes carry nothing.
fn fields_for_code(code: &str) -> &'static [(&'static str, FieldKind)] {
    match code {
        "A150" => ARCHIVE_FIELDS,
        "PL120" => POLICY_FIELDS,
        "AR190" => RESTORE_FIELDS,
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for SummaryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

pub type TaskLogSummary = BTreeMap<String, SummaryValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogLine {
    pub code: String,
    pub pairs: Vec<(String, String)>,
}

/// Extract the code token and `key=value` pairs. `None` when the line
/// carries no recognizable code.
pub fn parse_log_line(line: &str) -> Option<ParsedLogLine> {
    let code = CODE_RE.captures(line)?.get(1)?.as_str().to_string();
    let pairs = PAIR_RE
        .captures_iter(line)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();
    Some(ParsedLogLine { code, pairs })
}

/// Typed fields contributed by one line.
pub fn summary_fields(line: &str) -> TaskLogSummary {
    let mut out = TaskLogSummary::new();
    let Some(parsed) = parse_log_line(line) else {
        return out;
    };
    let fields = fields_for_code(&parsed.code);
    for (key, raw) in parsed.pairs {
        let Some((name, kind)) = fields.iter().find(|(name, _)| *name == key) else {
            continue;
        };
        let value = match kind {
            FieldKind::Number => match raw.parse::<i64>() {
                Ok(n) => SummaryValue::Number(n),
                Err(_) => continue,
            },
            FieldKind::Text => SummaryValue::Text(raw),
        };
        out.insert((*name).to_string(), value);
    }
    out
}

/// Accumulated summaries keyed by task identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogSummaries {
    by_task: BTreeMap<String, TaskLogSummary>,
}

impl LogSummaries {
    pub fn get(&self, task_id: &str) -> Option<&TaskLogSummary> {
        self.by_task.get(task_id)
    }

    pub fn has_summary(&self, task_id: &str) -> bool {
        self.by_task.get(task_id).is_some_and(|s| !s.is_empty())
    }

    /// Terminal tasks with a summary already in hand cannot produce new log
    /// output, so their logs are not fetched again.
    pub fn is_settled(&self, task_id: &str, status: &TaskStatus) -> bool {
        status.is_terminal() && self.has_summary(task_id)
    }

    /// Merge fields into the task's summary, overwriting on key collision.
    /// The entry is only created once there is something to store.
    pub fn merge(&mut self, task_id: &str, fields: TaskLogSummary) {
        if fields.is_empty() {
            return;
        }
        self.by_task
            .entry(task_id.to_string())
            .or_default()
            .extend(fields);
    }

    /// Parse every line and merge the results. Returns how many fields were
    /// written.
    pub fn ingest_lines<'a, I>(&mut self, task_id: &str, lines: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut written = 0;
        for line in lines {
            let fields = summary_fields(line);
            written += fields.len();
            self.merge(task_id, fields);
        }
        written
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskLogSummary)> {
        self.by_task.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.by_task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }
}

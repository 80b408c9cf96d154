use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use tablewatch_core::{CanonicalTask, LogSummaries, TaskCounts, TaskLogSummary};
use tablewatch_monitor::PollingStatus;

/// Output format for task data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

/// Inline `key=value` rendering of one task's summary.
pub fn summary_line(summary: &TaskLogSummary) -> String {
    summary
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fixed-width task table; archive/restore rows carry their summary on a
/// second line when one has been extracted.
pub fn render_task_table(tasks: &[CanonicalTask], summaries: &LogSummaries) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:<10} {:>4}  {:<28} {:<32} {:<19}",
        "TYPE", "STATUS", "PCT", "NAME", "TABLE", "UPDATED"
    );
    for task in tasks {
        let kind = match task.subtype.as_deref() {
            Some(subtype) => subtype.to_string(),
            None => task.task_type.to_string(),
        };
        let _ = writeln!(
            out,
            "{:<22} {:<10} {:>3}%  {:<28} {:<32} {:<19}",
            truncate(&kind, 22),
            truncate(task.status.as_str(), 10),
            task.progress,
            truncate(task.display_name.as_deref().unwrap_or("-"), 28),
            truncate(task.qualified_table().as_deref().unwrap_or("-"), 32),
            format_time(task.sort_time()),
        );
        if let Some(summary) = summaries.get(&task.id).filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "{:>24}{}", "", summary_line(summary));
        }
    }
    out
}

fn join_counts<'a>(counts: impl Iterator<Item = (String, &'a usize)>) -> String {
    counts
        .map(|(key, n)| format!("{key}:{n}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Badge footer describing the whole dataset.
pub fn render_counts(counts: &TaskCounts) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "types:    {}",
        join_counts(counts.types.iter().map(|(k, v)| (k.to_string(), v)))
    );
    let _ = writeln!(
        out,
        "statuses: {}",
        join_counts(counts.status.iter().map(|(k, v)| (k.clone(), v)))
    );
    if !counts.subtypes.is_empty() {
        let _ = writeln!(
            out,
            "subtypes: {}",
            join_counts(counts.subtypes.iter().map(|(k, v)| (k.clone(), v)))
        );
    }
    out
}

pub fn render_polling(polling: &PollingStatus) -> String {
    let merge = if polling.merge { "on" } else { "idle" };
    match polling.scan_interval_secs {
        Some(secs) => format!("merge poll: {merge}, scan refresh: every {secs}s"),
        None => format!("merge poll: {merge}, scan refresh: off"),
    }
}

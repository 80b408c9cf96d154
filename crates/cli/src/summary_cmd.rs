use anyhow::{Context, Result};
use serde::Serialize;

use tablewatch_api_client::ApiClient;
use tablewatch_core::{LogSummaries, TaskLogSummary, TaskSource};

use crate::output::{OutputFormat, print_json, summary_line};

#[derive(Serialize)]
struct SummaryOutput<'a> {
    task_id: &'a str,
    log_lines: usize,
    summary: Option<&'a TaskLogSummary>,
}

/// Fetch one task's logs and print the structured summary they carry.
pub async fn run_summary(client: &ApiClient, task_id: &str, format: OutputFormat) -> Result<()> {
    let lines = client
        .fetch_task_logs(task_id)
        .await
        .with_context(|| format!("Failed to fetch logs for task {task_id}"))?;

    let mut summaries = LogSummaries::default();
    summaries.ingest_lines(task_id, lines.iter().map(|l| l.message.as_str()));
    let summary = summaries.get(task_id);

    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            task_id,
            log_lines: lines.len(),
            summary,
        }),
        OutputFormat::Text => {
            match summary {
                Some(summary) => {
                    println!("{task_id}: {}", summary_line(summary));
                }
                None => println!(
                    "{task_id}: no structured summary in {} log lines",
                    lines.len()
                ),
            }
            Ok(())
        }
    }
}

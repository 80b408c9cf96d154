use anyhow::{Result, bail};
use serde::Serialize;

use tablewatch_api_client::ApiClient;
use tablewatch_core::{CanonicalTask, FilterState, LogSummaries, TaskCounts, TaskStatus, TaskType};
use tablewatch_monitor::{Dashboard, FullRefresh, RefreshOutcome};

use crate::output::{OutputFormat, print_json, render_counts, render_task_table};

/// Filter selections from the command line.
#[derive(Debug, Clone, Default)]
pub struct TaskFilterArgs {
    pub types: Vec<TaskType>,
    pub statuses: Vec<String>,
    pub subtypes: Vec<String>,
    pub query: Option<String>,
}

impl TaskFilterArgs {
    fn apply_to(&self, dashboard: &Dashboard<ApiClient>) {
        for task_type in &self.types {
            dashboard.toggle_type(*task_type);
        }
        for status in &self.statuses {
            dashboard.toggle_status(TaskStatus::normalize(status.trim()));
        }
        for subtype in &self.subtypes {
            dashboard.toggle_subtype(subtype.trim());
        }
        if let Some(query) = &self.query {
            dashboard.set_query(query.as_str());
        }
    }
}

fn empty_view_message(filter: &FilterState) -> &'static str {
    if filter.is_active() {
        "No tasks match the current filter."
    } else {
        "No tasks."
    }
}

#[derive(Serialize)]
struct TasksOutput<'a> {
    cluster: &'a str,
    filter: &'a FilterState,
    tasks: &'a [CanonicalTask],
    counts: &'a TaskCounts,
    summaries: &'a LogSummaries,
}

/// Warn about failed populations; error out only when nothing could be fetched.
pub fn report_refresh(refresh: &FullRefresh) -> Result<()> {
    let outcomes = [
        ("merge tasks", &refresh.merge),
        ("scan tasks", &refresh.scan),
        ("archive history", &refresh.archive),
    ];
    let failures: Vec<String> = outcomes
        .iter()
        .filter_map(|(name, outcome)| match outcome {
            RefreshOutcome::Failed(msg) => Some(format!("{name}: {msg}")),
            _ => None,
        })
        .collect();
    if failures.len() == outcomes.len() {
        bail!("Failed to fetch tasks ({})", failures.join("; "));
    }
    for failure in failures {
        eprintln!("Warning: could not refresh {failure}");
    }
    Ok(())
}

pub async fn run_tasks(
    dashboard: Dashboard<ApiClient>,
    filter: &TaskFilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let refresh = dashboard.refresh_all().await;
    report_refresh(&refresh)?;

    filter.apply_to(&dashboard);
    let snapshot = dashboard.snapshot();
    let cluster = dashboard.options().cluster_id.clone();
    dashboard.dispose();

    match format {
        OutputFormat::Json => print_json(&TasksOutput {
            cluster: &cluster,
            filter: &snapshot.filter,
            tasks: &snapshot.tasks,
            counts: &snapshot.counts,
            summaries: &snapshot.summaries,
        }),
        OutputFormat::Text => {
            if snapshot.tasks.is_empty() {
                println!("{}", empty_view_message(&snapshot.filter));
            } else {
                print!("{}", render_task_table(&snapshot.tasks, &snapshot.summaries));
            }
            println!();
            print!("{}", render_counts(&snapshot.counts));
            Ok(())
        }
    }
}

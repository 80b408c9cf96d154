use anyhow::Result;
use tracing::{info, warn};

use tablewatch_api_client::ApiClient;
use tablewatch_monitor::{Dashboard, DashboardSnapshot, RefreshOutcome};

use crate::output::{render_counts, render_polling, render_task_table};

fn render(cluster: &str, snapshot: &DashboardSnapshot) {
    println!();
    println!(
        "== {cluster} | rev {} | {} ==",
        snapshot.revision,
        render_polling(&snapshot.polling)
    );
    if snapshot.tasks.is_empty() {
        println!("No tasks.");
    } else {
        print!("{}", render_task_table(&snapshot.tasks, &snapshot.summaries));
    }
    print!("{}", render_counts(&snapshot.counts));
}

/// Run the dashboard until Ctrl-C, re-rendering on every change.
pub async fn run_watch(dashboard: Dashboard<ApiClient>, scan_interval_secs: u64) -> Result<()> {
    let cluster = dashboard.options().cluster_id.clone();
    let mut changes = dashboard.subscribe();

    info!("Watching cluster {cluster}");
    let refresh = dashboard.refresh_all().await;
    for (name, outcome) in [
        ("merge tasks", &refresh.merge),
        ("scan tasks", &refresh.scan),
        ("archive history", &refresh.archive),
    ] {
        if let RefreshOutcome::Failed(msg) = outcome {
            warn!("Initial fetch of {name} failed: {msg}");
        }
    }
    dashboard.set_scan_refresh_interval(scan_interval_secs);

    changes.borrow_and_update();
    let mut last_revision = None;
    let mut render_if_changed = |dashboard: &Dashboard<ApiClient>| {
        let snapshot = dashboard.snapshot();
        if last_revision != Some(snapshot.revision) {
            last_revision = Some(snapshot.revision);
            render(&cluster, &snapshot);
        }
    };
    render_if_changed(&dashboard);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                render_if_changed(&dashboard);
            }
            _ = &mut shutdown => {
                info!("Received Ctrl+C");
                break;
            }
        }
    }

    dashboard.dispose();
    info!("Stopped watching cluster {cluster}");
    Ok(())
}

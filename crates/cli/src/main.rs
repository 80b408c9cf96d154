mod config;
mod output;
mod summary_cmd;
mod tasks_cmd;
mod watch_cmd;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use tablewatch_api_client::{ApiClient, RetryConfig};
use tablewatch_core::TaskType;
use tablewatch_monitor::{Dashboard, DashboardOptions};
use tablewatch_runtime_config::RuntimeConfig;

use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "tablewatch",
    version,
    about = "tablewatch - list, filter and watch background tasks on a cluster"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Cluster to query (overrides monitor.cluster_id)
    #[arg(long)]
    cluster: Option<String>,

    /// Server URL (overrides server.url)
    #[arg(long)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all task populations once and print the filtered view
    Tasks {
        #[command(flatten)]
        target: TargetArgs,

        /// Only show these task types (merge, test-table-generation, scan, archive)
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<TaskType>,

        /// Only show these statuses
        #[arg(long = "status", value_name = "STATUS")]
        statuses: Vec<String>,

        /// Only show these archive/restore scan subtypes
        #[arg(long = "subtype", value_name = "SUBTYPE")]
        subtypes: Vec<String>,

        /// Case-insensitive text filter on name and database.table
        #[arg(long)]
        query: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Extract the structured summary from one task's logs
    Summary {
        task_id: String,

        /// Server URL (overrides server.url)
        #[arg(long)]
        server: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Keep the dashboard running and re-render on every change
    ///
    /// Merge tasks are polled every 3s while any is running. While none is,
    /// new merge tasks show up on the next scan refresh, so set
    /// --scan-interval to keep the merge list current.
    Watch {
        #[command(flatten)]
        target: TargetArgs,

        /// Fixed scan refresh interval in seconds (max one day); 0 disables it
        #[arg(long, value_name = "SECS")]
        scan_interval: Option<u64>,
    },

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long)]
        server: Option<String>,

        /// Set the API key
        #[arg(long)]
        api_key: Option<String>,

        /// Set the default cluster
        #[arg(long)]
        cluster: Option<String>,

        /// Set the scan refresh interval in seconds
        #[arg(long, value_name = "SECS")]
        scan_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tablewatch=info".parse().expect("valid log directive"))
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Tasks {
            target,
            types,
            statuses,
            subtypes,
            query,
            format,
        } => {
            let dashboard = open_dashboard(&target)?.0;
            let filter = tasks_cmd::TaskFilterArgs {
                types,
                statuses,
                subtypes,
                query,
            };
            tasks_cmd::run_tasks(dashboard, &filter, format).await
        }
        Commands::Summary {
            task_id,
            server,
            format,
        } => {
            let mut config = config::load_config()?;
            if let Some(url) = server {
                config.server.url = url;
            }
            let client = connect(&config)?;
            summary_cmd::run_summary(&client, &task_id, format).await
        }
        Commands::Watch {
            target,
            scan_interval,
        } => {
            let (dashboard, config) = open_dashboard(&target)?;
            let secs = scan_interval.unwrap_or(config.monitor.scan_refresh_interval_secs);
            watch_cmd::run_watch(dashboard, secs).await
        }
        Commands::Config {
            server,
            api_key,
            cluster,
            scan_interval,
        } => {
            let update = config::ConfigUpdate {
                server,
                api_key,
                cluster,
                scan_interval,
            };
            if update.is_empty() {
                config::show_config()
            } else {
                config::set_config(&update)
            }
        }
    }
}

/// Build the API client from the server and retry settings.
fn connect(config: &RuntimeConfig) -> Result<ApiClient> {
    let mut client = ApiClient::new(
        &config.server.url,
        Duration::from_secs(config.server.timeout_secs),
    )
    .context("Failed to create API client")?;
    client.set_auth(config.server.api_key.clone());
    client.set_retry(RetryConfig::with_max_retries(config.retry.max_retries));
    Ok(client)
}

/// Load config, apply command-line overrides and construct the dashboard.
fn open_dashboard(target: &TargetArgs) -> Result<(Dashboard<ApiClient>, RuntimeConfig)> {
    let mut config = config::load_config()?;
    if let Some(url) = &target.server {
        config.server.url = url.clone();
    }
    if let Some(cluster) = &target.cluster {
        config.monitor.cluster_id = cluster.clone();
    }
    if config.monitor.cluster_id.trim().is_empty() {
        bail!("No cluster configured. Pass --cluster or run `tablewatch config --cluster <ID>`");
    }

    let client = connect(&config)?;
    let options = DashboardOptions::from_settings(&config.monitor);
    Ok((Dashboard::new(client, options), config))
}

//! CLI binary: one sync run, then a report.

use anyhow::Context;
use clap::Parser;
use task_sync_engine::{SyncConfig, SyncCoordinator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mirror a Todoist account into a local SQLite database.
#[derive(Parser)]
#[command(name = "task-sync", version, about)]
struct Cli {
    /// Remote API root, e.g. https://api.todoist.com/sync/
    #[arg(long, env = "TODOIST_API_ENDPOINT")]
    endpoint: String,

    /// API version path segment.
    #[arg(long, env = "TODOIST_API_VERSION", default_value = "v8/")]
    api_version: String,

    /// Bearer token.
    #[arg(long, env = "TODOIST_API_TOKEN", hide_env_values = true)]
    token: String,

    /// Local database URL.
    #[arg(long, env = "TODOIST_DATABASE", default_value = "sqlite:todoist.db")]
    database: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TODOIST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Print every outcome, not just per-entity totals.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> SyncConfig {
        SyncConfig {
            api_endpoint: self.endpoint.clone(),
            api_version: self.api_version.clone(),
            api_token: self.token.clone(),
            database_url: self.database.clone(),
            request_timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("task_sync_engine=info,task_sync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let started = chrono::Local::now();
    println!("-------------------------------------------");
    println!("Sync started at {}", started.to_rfc3339());
    println!("-------------------------------------------");

    let coordinator = SyncCoordinator::from_config(&config)
        .await
        .with_context(|| format!("setting up sync against {}", config.database_url))?;

    let report = coordinator.run().await.context("sync run failed")?;
    print!("{}", report.render(cli.verbose));

    info!(run_id = %report.run_id, failures = report.failures(), "Done");
    println!("Sync finished at {}", chrono::Local::now().to_rfc3339());
    Ok(())
}

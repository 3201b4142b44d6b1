//! fairgridd — the FairGrid daemon.
//!
//! Composition root for the fair scheduler. Builds one `FairScheduler`
//! from config and hands it to the subsystems that need it:
//! - Simulated worker pool (exercise limits and rotation end to end)
//! - Queue naming for isolation strategies
//! - Config validation
//!
//! # Usage
//!
//! ```text
//! fairgridd simulate --config fairgrid.toml --orgs 8 --workers 16
//! fairgridd queue-name --base billing --org acme --strategy per_org
//! fairgridd check-config fairgrid.toml
//! ```

mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fairgrid_core::{FairSchedulerConfig, IsolationStrategy};
use fairgrid_scheduler::{get_queue_name, FairScheduler};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::simulate::SimulationConfig;

#[derive(Parser)]
#[command(name = "fairgridd", about = "FairGrid fair scheduler daemon", version)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive a scheduler with a simulated multi-org worker pool.
    Simulate {
        /// Scheduler config file (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of orgs.
        #[arg(long, default_value = "4")]
        orgs: usize,

        /// Jobs queued per org.
        #[arg(long, default_value = "25")]
        jobs_per_org: usize,

        /// Extra jobs queued for the first org (a noisy tenant).
        #[arg(long, default_value = "0")]
        hot_org_extra_jobs: usize,

        /// Concurrent worker tasks.
        #[arg(long, default_value = "8")]
        workers: usize,

        /// Simulated job duration in milliseconds.
        #[arg(long, default_value = "50")]
        job_ms: u64,

        /// Release every Nth job of an org as failed.
        #[arg(long)]
        fail_every: Option<usize>,

        /// Print the final report as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Also print the final metrics in Prometheus text format.
        #[arg(long)]
        prometheus: bool,
    },

    /// Resolve the physical queue name for an org.
    QueueName {
        /// Base queue name.
        #[arg(long)]
        base: String,

        /// Org identifier.
        #[arg(long)]
        org: String,

        /// Isolation strategy: shared, per_org, or priority_lanes.
        #[arg(long, default_value = "shared")]
        strategy: IsolationStrategy,

        /// Job priority (priority_lanes only).
        #[arg(long)]
        priority: Option<i32>,
    },

    /// Load and validate a config file, then print the effective config.
    CheckConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    match cli.command {
        Command::Simulate {
            config,
            orgs,
            jobs_per_org,
            hot_org_extra_jobs,
            workers,
            job_ms,
            fail_every,
            json,
            prometheus,
        } => {
            let sim = SimulationConfig {
                orgs,
                jobs_per_org,
                workers,
                job_duration: Duration::from_millis(job_ms),
                fail_every,
                hot_org_extra_jobs,
            };
            run_simulation(config, sim, json, prometheus).await
        }
        Command::QueueName {
            base,
            org,
            strategy,
            priority,
        } => {
            println!("{}", get_queue_name(&base, &org, strategy, priority));
            Ok(())
        }
        Command::CheckConfig { path } => {
            let config = FairSchedulerConfig::from_file(&path)?;
            info!(path = ?path, share_cap = config.share_cap(), "config is valid");
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,fairgridd=debug,fairgrid=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run_simulation(
    config_path: Option<PathBuf>,
    sim: SimulationConfig,
    json: bool,
    prometheus: bool,
) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => FairSchedulerConfig::from_file(path)?,
        None => FairSchedulerConfig::default(),
    };
    debug!(?config, "scheduler config loaded");

    let scheduler = Arc::new(FairScheduler::new(config)?);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let report = simulate::run(scheduler.clone(), sim, shutdown_rx).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", simulate::render_table(&report));
    }
    if prometheus {
        println!();
        print!(
            "{}",
            fairgrid_metrics::render_prometheus(&scheduler.get_metrics())
        );
    }
    Ok(())
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cadence_core::config::CadenceConfig;
use cadence_scheduler::context::{init_global, shutdown_global};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// Cadence - run named periodic tasks on a background worker thread
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register demo tasks and let the scheduler drive them for a while
    Run {
        /// Task to register, as NAME=MILLIS (repeatable)
        #[arg(
            short,
            long = "task",
            value_name = "NAME=MILLIS",
            required = true,
            value_parser = parse_task
        )]
        tasks: Vec<TaskSpec>,

        /// Make the named task fail on every run (repeatable)
        #[arg(long = "fail", value_name = "NAME")]
        failing: Vec<String>,

        /// How long to run before removing every task
        #[arg(short, long, default_value_t = 5)]
        duration_secs: u64,

        /// Path to configuration file (overrides CADENCE_CONFIG)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TaskSpec {
    name: String,
    period: Duration,
}

fn parse_task(raw: &str) -> Result<TaskSpec> {
    let Some((name, millis)) = raw.split_once('=') else {
        bail!("expected NAME=MILLIS, got '{raw}'");
    };
    if name.is_empty() {
        bail!("task name must not be empty");
    }
    let millis: u64 = millis
        .parse()
        .with_context(|| format!("invalid period '{millis}' for task '{name}'"))?;
    Ok(TaskSpec {
        name: name.to_string(),
        period: Duration::from_millis(millis),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            tasks,
            failing,
            duration_secs,
            config,
        } => run(tasks, failing, Duration::from_secs(duration_secs), config),
    }
}

fn run(
    tasks: Vec<TaskSpec>,
    failing: Vec<String>,
    duration: Duration,
    config_path: Option<String>,
) -> Result<()> {
    let config = CadenceConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CadenceConfig::default()
    });

    let scheduler = init_global(config.scheduler)?;
    for spec in tasks {
        let runs = Arc::new(AtomicU64::new(0));
        let name = spec.name.clone();
        let fails = failing.contains(&spec.name);
        scheduler
            .add_fallible_task(
                spec.name.clone(),
                move || {
                    let n = runs.fetch_add(1, Ordering::Relaxed) + 1;
                    if fails {
                        bail!("'{name}' configured to fail (run {n})");
                    }
                    info!(job = %name, run = n, "tick");
                    Ok(())
                },
                spec.period,
            )
            .with_context(|| format!("registering task '{}'", spec.name))?;
    }

    info!(secs = duration.as_secs(), "scheduler running");
    std::thread::sleep(duration);

    let remaining: Vec<String> = scheduler
        .periodic_tasks()
        .into_iter()
        .map(|task| task.name)
        .collect();
    info!(?remaining, "stopping scheduler");
    shutdown_global();
    Ok(())
}

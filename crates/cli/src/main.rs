//! propscribe CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `propscribe.toml` (or `--config`) and the
//!    secrets in the environment, and validate both.
//! 2. **Wire observability**: configure `tracing-subscriber` with a JSON or
//!    human-readable layer and, when configured, an OpenTelemetry OTLP
//!    exporter.
//! 3. **Construct infrastructure**: `GithubClient`, `TelegramNotifier`, the
//!    proposal sources, and the seen-set store, injected into
//!    `RunController`.
//! 4. **Dispatch the subcommand**:
//!    - `run`: one tick, for an external scheduler such as cron.
//!    - `watch`: ticks forever on `run.poll_interval_secs`, never overlapping.
//!
//!    Both need `run.seen_store_path`; `watch --in-memory` opts out.
//!    - `render`: preview the document for a proposal record on stdout.
//!    - `next-number`: print the number the next proposal would receive.

mod app;
mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchestrator::{RunController, RunReport};
use pipeline::{render, MdxFormatter, Proposal, ProposalNumber, Timestamp, VotingLinks};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::app::SeenStoreMode;
use crate::config::{load_dotenv, Config, DEFAULT_CONFIG_PATH};
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "propscribe")]
#[command(version, about = "Files governance proposals as numbered documentation pull requests", long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter directive (e.g. `debug` or `info,orchestrator=debug`).
    /// Overrides `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exactly one tick.
    Run,

    /// Run ticks forever until interrupted.
    Watch {
        /// Keep seen markers in memory instead of `run.seen_store_path`.
        #[arg(long)]
        in_memory: bool,
    },

    /// Render a proposal record (JSON) and print the document.
    Render {
        /// JSON file with `id`, `kind`, `author`, optional `title`, and `body`.
        #[arg(short, long)]
        input: PathBuf,

        /// Proposal number to render with, e.g. `7.3`.
        #[arg(short, long)]
        number: ProposalNumber,
    },

    /// Print the number the next proposal would receive.
    NextNumber,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_dotenv()?;

    // `render` works without a configuration file.
    let config = match (&cli.command, cli.config.exists()) {
        (Commands::Render { .. }, false) => None,
        _ => Some(Config::load(&cli.config)?),
    };

    let otlp = config.as_ref().and_then(|c| c.telemetry.otlp_endpoint.as_deref());
    let telemetry = telemetry::init(cli.log_level.as_deref(), cli.log_format, otlp)?;

    let result = dispatch(cli.command, config.as_ref()).await;
    if let Err(err) = &result {
        error!("propscribe failed: {err:#}");
    }
    telemetry.shutdown();
    result
}

async fn dispatch(command: Commands, config: Option<&Config>) -> Result<()> {
    match command {
        Commands::Render { input, number } => {
            let links = config.map(|c| c.links.clone()).unwrap_or_default();
            render_preview(&input, number, &links)
        }
        Commands::Run => {
            let controller = app::controller(required(config)?, SeenStoreMode::Durable).await?;
            let report = controller.run_once(Timestamp::now()).await?;
            log_report(&report);
            Ok(())
        }
        Commands::Watch { in_memory } => {
            let config = required(config)?;
            let seen = if in_memory {
                SeenStoreMode::InMemory
            } else {
                SeenStoreMode::Durable
            };
            let controller = app::controller(config, seen).await?;
            watch(&controller, Duration::from_secs(config.run.poll_interval_secs)).await
        }
        Commands::NextNumber => {
            let publisher = app::publisher(required(config)?)?;
            let number = publisher.assign_number(Timestamp::now()).await?;
            println!("{number}");
            Ok(())
        }
    }
}

fn required(config: Option<&Config>) -> Result<&Config> {
    config.context("this command needs a configuration file")
}

/// Ticks on `period` until Ctrl-C. A tick always runs to completion; the
/// next one is scheduled only after it returns.
async fn watch(controller: &RunController, period: Duration) -> Result<()> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(period_secs = period.as_secs(), "watching for proposals");
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("interrupted, stopping");
                return Ok(());
            }
        }
        match controller.run_once(Timestamp::now()).await {
            Ok(report) => log_report(&report),
            Err(err) => warn!(error = %err, "run aborted, retrying next tick"),
        }
    }
}

fn log_report(report: &RunReport) {
    let published: Vec<&str> = report
        .published
        .iter()
        .map(|a| a.pull_request.as_str())
        .collect();
    if report.is_clean() {
        info!(?published, already_started = report.already_started.len(), "run complete");
    } else {
        warn!(
            ?published,
            failed = report.failed.len(),
            unrecorded = report.unrecorded.len(),
            "run complete with failures"
        );
    }
}

fn render_preview(input: &Path, number: ProposalNumber, links: &VotingLinks) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let proposal: Proposal = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a proposal record", input.display()))?;
    let document = render(&proposal, number, links, &MdxFormatter)?;
    print!("{}", document.text());
    Ok(())
}

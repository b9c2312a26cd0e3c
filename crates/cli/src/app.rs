//! Construction of the concrete infrastructure from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use feeds::{CombinedSource, GovernorSource, SnapshotSource};
use github::GithubClient;
use notify::TelegramNotifier;
use orchestrator::{Publisher, RunController, RunSettings};
use pipeline::{MdxFormatter, ProposalSource, SeenStore};
use store::{FileSeenStore, MemorySeenStore};
use tracing::{info, warn};

use crate::config::{require_env, Config};

const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ETH_RPC_URL: &str = "ETH_RPC_URL";

/// Builds the publisher against the live GitHub API.
pub fn publisher(config: &Config) -> anyhow::Result<Publisher> {
    let github = GithubClient::new(require_env(GITHUB_TOKEN)?).context("failed to create GitHub client")?;
    let target = config.publish_target()?;
    if config.run.dev_mode {
        warn!(repo = %target.upstream, "dev mode: pull requests target the fork");
    }
    Ok(Publisher::new(
        Arc::new(github),
        Arc::new(MdxFormatter),
        target,
        config.term_reference(),
        config.numbering_policy(),
        config.links.clone(),
    ))
}

fn source(config: &Config) -> anyhow::Result<CombinedSource> {
    let sources_config = &config.sources;
    let mut sources: Vec<Arc<dyn ProposalSource>> = Vec::new();

    if let Some(url) = &sources_config.snapshot_url {
        let snapshot = SnapshotSource::new(
            url.as_str(),
            config.links.snapshot_space.as_str(),
            Duration::from_secs(sources_config.lookback_secs),
        )?;
        info!(space = %config.links.snapshot_space, "polling Snapshot");
        sources.push(Arc::new(snapshot));
    }
    if let Some(address) = &sources_config.governor_address {
        let governor = GovernorSource::new(
            require_env(ETH_RPC_URL)?,
            address.as_str(),
            sources_config.lookback_blocks,
        )?;
        info!(%address, "polling Governor");
        sources.push(Arc::new(governor));
    }
    if sources.is_empty() {
        warn!("no proposal sources configured; runs will find nothing");
    }
    Ok(CombinedSource::new(sources))
}

/// Where seen markers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenStoreMode {
    /// The JSON file at `run.seen_store_path`, which must be configured.
    Durable,
    /// Markers last only as long as this process.
    InMemory,
}

async fn seen_store(config: &Config, mode: SeenStoreMode) -> anyhow::Result<Arc<dyn SeenStore>> {
    match mode {
        SeenStoreMode::Durable => {
            let path = config.seen_store_path()?;
            let store = FileSeenStore::open(path)
                .await
                .with_context(|| format!("failed to open seen-set store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        SeenStoreMode::InMemory => {
            warn!("in-memory seen-set store: markers are lost when this process exits");
            Ok(Arc::new(MemorySeenStore::default()))
        }
    }
}

/// Builds the run controller with every collaborator wired up.
pub async fn controller(config: &Config, seen: SeenStoreMode) -> anyhow::Result<RunController> {
    let notifier = TelegramNotifier::new(require_env(TELEGRAM_BOT_TOKEN)?)?;
    Ok(RunController::new(
        Arc::new(source(config)?),
        seen_store(config, seen).await?,
        Arc::new(notifier),
        publisher(config)?,
        RunSettings {
            channel: config.channel()?,
            max_per_run: config.run.max_per_run,
        },
    ))
}

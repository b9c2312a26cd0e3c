//! Configuration loading and validation.
//!
//! Non-secret settings come from a TOML file; secrets come from the
//! environment (a `.env` file in the working directory is loaded first, if
//! present). Everything is validated before a run can start.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pipeline::{
    BranchName, ChannelId, NumberingPolicy, OrdinalCorrection, RepositoryId, Term, TermReference,
    VotingLinks,
};
use serde::Deserialize;
use thiserror::Error;

use orchestrator::PublishTarget;

pub const DEFAULT_CONFIG_PATH: &str = "propscribe.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to load .env file: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// File sections
// ---------------------------------------------------------------------------

/// `[repository]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Owner of the fork that receives branches and commits.
    pub owner: String,
    /// Owner of the repository pull requests are opened against.
    pub upstream_owner: String,
    /// Repository name, shared by fork and upstream.
    pub name: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_proposals_dir")]
    pub proposals_dir: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_proposals_dir() -> String {
    "src/pages/dao/proposals".to_string()
}

fn default_file_extension() -> String {
    "mdx".to_string()
}

fn default_branch_prefix() -> String {
    "prop/".to_string()
}

/// `[numbering]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumberingConfig {
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,
    #[serde(default = "default_reference_term")]
    pub reference_term: u32,
    #[serde(default = "default_corrections")]
    pub corrections: Vec<OrdinalCorrection>,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            reference_year: default_reference_year(),
            reference_term: default_reference_term(),
            corrections: default_corrections(),
        }
    }
}

fn default_reference_year() -> i32 {
    2025
}

fn default_reference_term() -> u32 {
    6
}

/// Term 6 contains sub-numbered files (`6.6.1`, `6.6.2`) that inflate the
/// raw count by one.
fn default_corrections() -> Vec<OrdinalCorrection> {
    vec![OrdinalCorrection {
        term: Term::new(6),
        adjustment: -2,
        expires: NaiveDate::from_ymd_opt(2026, 1, 1),
    }]
}

/// `[notification]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Chat id that receives alerts.
    pub channel: String,
}

/// `[sources]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Snapshot GraphQL hub; the space polled is `links.snapshot_space`.
    /// No Snapshot polling when unset.
    #[serde(default)]
    pub snapshot_url: Option<String>,
    /// Governor contract to poll; no on-chain polling when unset.
    #[serde(default)]
    pub governor_address: Option<String>,
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            snapshot_url: None,
            governor_address: None,
            lookback_secs: default_lookback_secs(),
            lookback_blocks: default_lookback_blocks(),
        }
    }
}

fn default_lookback_secs() -> u64 {
    24 * 60 * 60
}

/// Roughly one day of 12-second blocks.
fn default_lookback_blocks() -> u64 {
    7_200
}

/// `[run]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_per_run")]
    pub max_per_run: usize,
    #[serde(default)]
    pub dev_mode: bool,
    /// JSON file holding seen markers. Required by `run`; `watch` may opt
    /// out with `--in-memory`.
    #[serde(default)]
    pub seen_store_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_per_run: default_max_per_run(),
            dev_mode: false,
            seen_store_path: None,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_max_per_run() -> usize {
    5
}

/// `[telemetry]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub numbering: NumberingConfig,
    pub notification: NotificationConfig,
    #[serde(default)]
    pub links: VotingLinks,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Reads, parses, and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.publish_target()?;
        self.channel()?;

        if self.repository.proposals_dir.trim_matches('/').is_empty() {
            return Err(invalid("repository.proposals_dir", "must not be empty"));
        }
        if self.repository.file_extension.is_empty() || self.repository.file_extension.contains('.') {
            return Err(invalid(
                "repository.file_extension",
                "must be non-empty and given without a dot",
            ));
        }
        if self.run.max_per_run == 0 {
            return Err(invalid("run.max_per_run", "must be at least 1"));
        }
        if self.run.poll_interval_secs == 0 {
            return Err(invalid("run.poll_interval_secs", "must be at least 1"));
        }

        let mut terms = HashSet::new();
        for correction in &self.numbering.corrections {
            if !terms.insert(correction.term) {
                return Err(invalid(
                    "numbering.corrections",
                    format!("term {} has more than one correction", correction.term),
                ));
            }
        }
        Ok(())
    }

    /// Where proposals are filed, with dev mode applied.
    pub fn publish_target(&self) -> Result<PublishTarget, ConfigError> {
        let repo = &self.repository;
        let fork = RepositoryId::new(&repo.owner, &repo.name)
            .ok_or_else(|| invalid("repository.owner", "owner and name must be non-empty"))?;
        let upstream = RepositoryId::new(&repo.upstream_owner, &repo.name)
            .ok_or_else(|| invalid("repository.upstream_owner", "must be non-empty"))?;
        let base_branch = BranchName::new(&repo.base_branch)
            .ok_or_else(|| invalid("repository.base_branch", "must be non-empty"))?;

        let target = PublishTarget {
            fork,
            upstream,
            base_branch,
            proposals_dir: repo.proposals_dir.trim_matches('/').to_string(),
            file_extension: repo.file_extension.clone(),
            branch_prefix: repo.branch_prefix.clone(),
        };
        Ok(if self.run.dev_mode {
            target.into_dev_mode()
        } else {
            target
        })
    }

    /// Path of the durable seen-set store.
    pub fn seen_store_path(&self) -> Result<&Path, ConfigError> {
        self.run
            .seen_store_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| {
                invalid(
                    "run.seen_store_path",
                    "required to remember processed proposals between runs",
                )
            })
    }

    pub fn channel(&self) -> Result<ChannelId, ConfigError> {
        ChannelId::new(self.notification.channel.trim())
            .ok_or_else(|| invalid("notification.channel", "must be non-empty"))
    }

    pub fn term_reference(&self) -> TermReference {
        TermReference {
            year: self.numbering.reference_year,
            term: self.numbering.reference_term,
        }
    }

    pub fn numbering_policy(&self) -> NumberingPolicy {
        NumberingPolicy::new(self.numbering.corrections.clone())
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Loads `.env` from the working directory if it exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::EnvLoad(err)),
    }
}

/// Reads a required secret from the environment.
pub fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

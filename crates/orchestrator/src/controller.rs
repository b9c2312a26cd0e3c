//! One scheduler tick: fetch, filter, notify, publish, mark seen.
//!
//! Proposals are processed strictly one after another. A failure for one
//! proposal is logged and leaves it unseen; the tick continues with the next
//! candidate. Only a failing proposal source aborts the tick.
//!
//! The seen marker is written after publication returns. A crash between the
//! two means the next tick publishes again, which the branch-exists check
//! turns into a no-op.

use std::collections::HashSet;
use std::sync::Arc;

use pipeline::{
    ChannelId, Notifier, Proposal, ProposalId, ProposalSource, PublicationArtifact, RunId,
    SeenStore, SourceError, Timestamp,
};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

use crate::publisher::{PublishOutcome, Publisher};

/// Errors that abort a whole tick.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("proposal source unavailable: {0}")]
    Source(#[from] SourceError),
}

/// Per-tick limits and destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Chat channel that receives new-proposal alerts.
    pub channel: ChannelId,
    /// Maximum number of unseen proposals processed per tick.
    pub max_per_run: usize,
}

/// A proposal whose processing failed during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedProposal {
    pub id: ProposalId,
    pub reason: String,
    /// Whether a later tick can succeed without manual intervention.
    pub retryable: bool,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub published: Vec<PublicationArtifact>,
    /// Proposals whose branch already existed.
    pub already_started: Vec<ProposalId>,
    pub failed: Vec<FailedProposal>,
    /// Unseen proposals left for a later tick because of `max_per_run`.
    pub deferred: Vec<ProposalId>,
    /// Published (or already started) proposals whose seen marker could not
    /// be written.
    pub unrecorded: Vec<ProposalId>,
    /// Candidates skipped because a marker already existed.
    pub skipped_seen: usize,
}

impl RunReport {
    /// Returns `true` if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unrecorded.is_empty()
    }
}

/// Drives one tick against the configured collaborators.
pub struct RunController {
    source: Arc<dyn ProposalSource>,
    seen: Arc<dyn SeenStore>,
    notifier: Arc<dyn Notifier>,
    publisher: Publisher,
    settings: RunSettings,
}

impl RunController {
    pub fn new(
        source: Arc<dyn ProposalSource>,
        seen: Arc<dyn SeenStore>,
        notifier: Arc<dyn Notifier>,
        publisher: Publisher,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            seen,
            notifier,
            publisher,
            settings,
        }
    }

    /// Returns the publisher used for each proposal.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Runs one tick at wall-clock time `now`.
    ///
    /// # Errors
    ///
    /// [`RunError::Source`] if the candidates cannot be fetched. No seen
    /// markers are written in that case.
    pub async fn run_once(&self, now: Timestamp) -> Result<RunReport, RunError> {
        let run_id = RunId::new_random();
        self.tick(now).instrument(info_span!("run", %run_id)).await
    }

    async fn tick(&self, now: Timestamp) -> Result<RunReport, RunError> {
        let candidates = self.source.fetch_candidates().await?;
        info!(candidates = candidates.len(), "fetched candidate proposals");

        let mut report = RunReport::default();
        let mut pending = self.filter_unseen(candidates, &mut report).await;

        if pending.len() > self.settings.max_per_run {
            let deferred = pending.split_off(self.settings.max_per_run);
            report.deferred = deferred.into_iter().map(|p| p.id).collect();
            info!(deferred = report.deferred.len(), "deferring proposals to a later run");
        }

        for proposal in pending {
            let span = info_span!("proposal", proposal_id = %proposal.id, kind = %proposal.kind);
            self.process(&proposal, now, &mut report).instrument(span).await;
        }

        info!(
            published = report.published.len(),
            already_started = report.already_started.len(),
            failed = report.failed.len(),
            deferred = report.deferred.len(),
            skipped_seen = report.skipped_seen,
            "run finished"
        );
        Ok(report)
    }

    async fn filter_unseen(
        &self,
        candidates: Vec<Proposal>,
        report: &mut RunReport,
    ) -> Vec<Proposal> {
        let mut in_batch = HashSet::new();
        let mut pending = Vec::new();
        for proposal in candidates {
            if !in_batch.insert(proposal.id.clone()) {
                continue;
            }
            match self.seen.exists(&proposal.id).await {
                Ok(true) => report.skipped_seen += 1,
                Ok(false) => pending.push(proposal),
                Err(err) => {
                    warn!(proposal_id = %proposal.id, error = %err, "could not check seen marker, skipping");
                    report.failed.push(FailedProposal {
                        id: proposal.id,
                        reason: err.to_string(),
                        retryable: true,
                    });
                }
            }
        }
        pending
    }

    async fn process(&self, proposal: &Proposal, now: Timestamp, report: &mut RunReport) {
        let alert = alert_text(proposal, &self.publisher.links().primary(proposal.kind, &proposal.id));
        if let Err(err) = self.notifier.send(&self.settings.channel, &alert).await {
            warn!(error = %err, "notification failed, continuing with publication");
        }

        match self.publisher.publish(proposal, now).await {
            Ok(outcome) => {
                match outcome {
                    PublishOutcome::Published(artifact) => report.published.push(artifact),
                    PublishOutcome::AlreadyStarted { .. } => {
                        report.already_started.push(proposal.id.clone());
                    }
                }
                if let Err(err) = self.seen.record(&proposal.id).await {
                    error!(error = %err, "published but seen marker not written; next run will find the existing branch");
                    report.unrecorded.push(proposal.id.clone());
                }
            }
            Err(err) => {
                let retryable = err.retry_policy().is_retryable();
                if retryable {
                    warn!(error = %err, "publication failed, will retry next run");
                } else {
                    error!(
                        error = %err,
                        orphaned_branch = err.orphaned_branch().map(|b| b.as_str()),
                        "publication failed, manual intervention required"
                    );
                }
                report.failed.push(FailedProposal {
                    id: proposal.id.clone(),
                    reason: err.to_string(),
                    retryable,
                });
            }
        }
    }
}

/// Chat message announcing a new proposal.
pub fn alert_text(proposal: &Proposal, vote_url: &str) -> String {
    let title = proposal.title.as_deref().unwrap_or(proposal.id.as_str());
    format!(
        "New {} proposal: {title}\nBy {}\n{vote_url}",
        proposal.kind, proposal.author
    )
}

//! Publication of one proposal as a documentation pull request.
//!
//! [`Publisher::publish`] performs, in order:
//!
//! 1. number assignment from the upstream proposal directory listing;
//! 2. rendering of the document (pure, so a malformed body fails before
//!    anything is created remotely);
//! 3. branch creation on the fork, named after the proposal id;
//! 4. file commit on that branch;
//! 5. pull request from the fork branch to the upstream base branch.
//!
//! An existing branch short-circuits to [`PublishOutcome::AlreadyStarted`]
//! without touching anything else. A prior run that created the branch but
//! failed to commit or open the pull request is therefore never resumed; the
//! branch has to be removed by hand.

use std::sync::Arc;

use pipeline::{
    current_term, next_number, render, ArtifactPath, BranchName, CommitSha, DocsRepository,
    DocumentFormatter, NewFile, NewPullRequest, NumberingError, NumberingPolicy, Proposal,
    ProposalNumber, PublicationArtifact, RenderError, RepositoryError, RepositoryId, RetryPolicy,
    TermReference, Timestamp, VotingLinks,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop the publication of one proposal.
///
/// None of these abort the run; the controller logs them and moves on.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The upstream proposal directory could not be listed.
    #[error("could not list '{dir}' in {repo}: {source}")]
    Listing {
        repo: RepositoryId,
        dir: String,
        #[source]
        source: RepositoryError,
    },

    #[error("could not assign a proposal number: {0}")]
    Numbering(#[from] NumberingError),

    #[error("'{0}' is not a valid branch or file name")]
    InvalidName(String),

    #[error("could not render proposal {number}: {source}")]
    Render {
        number: ProposalNumber,
        #[source]
        source: RenderError,
    },

    /// The base branch tip could not be read; nothing was created.
    #[error("could not read tip of '{branch}' in {repo}: {source}")]
    BaseRef {
        repo: RepositoryId,
        branch: BranchName,
        #[source]
        source: RepositoryError,
    },

    /// Branch creation failed for a reason other than "already exists".
    #[error("could not create branch '{branch}': {source}")]
    Branch {
        branch: BranchName,
        #[source]
        source: RepositoryError,
    },

    /// Another proposal already took this number. The branch is orphaned.
    #[error("'{path}' already exists, proposal {number} collides with an existing file; branch '{branch}' left without a commit")]
    FileCollision {
        number: ProposalNumber,
        branch: BranchName,
        path: ArtifactPath,
    },

    /// Committing the document failed. The branch is orphaned.
    #[error("could not commit '{path}' to '{branch}'; branch left without a commit: {source}")]
    Commit {
        branch: BranchName,
        path: ArtifactPath,
        #[source]
        source: RepositoryError,
    },

    /// Opening the pull request failed. The branch and commit are orphaned.
    #[error("could not open pull request for '{branch}' (commit {commit}); branch left without a pull request: {source}")]
    PullRequest {
        branch: BranchName,
        commit: CommitSha,
        #[source]
        source: RepositoryError,
    },
}

impl PublishError {
    /// Classifies this error for the operator.
    ///
    /// Anything that leaves a branch behind is non-retryable: the next tick
    /// sees the branch and stops.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Listing { source, .. }
            | Self::BaseRef { source, .. }
            | Self::Branch { source, .. } => source.retry_policy(),
            Self::Numbering(_)
            | Self::InvalidName(_)
            | Self::Render { .. }
            | Self::FileCollision { .. }
            | Self::Commit { .. }
            | Self::PullRequest { .. } => RetryPolicy::NonRetryable,
        }
    }

    /// The branch this failure left behind, if any.
    pub fn orphaned_branch(&self) -> Option<&BranchName> {
        match self {
            Self::FileCollision { branch, .. }
            | Self::Commit { branch, .. }
            | Self::PullRequest { branch, .. } => Some(branch),
            _ => None,
        }
    }
}

/// Result of a publish call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A fresh branch, commit, and pull request were created.
    Published(PublicationArtifact),
    /// The branch already existed; nothing was done.
    AlreadyStarted { branch: BranchName },
}

/// Where proposals are filed and how pull requests are routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    /// Contributor repository that receives branches and commits.
    pub fork: RepositoryId,
    /// Repository the pull request is opened against; also the source of
    /// the numbering listing.
    pub upstream: RepositoryId,
    /// Main line on both repositories.
    pub base_branch: BranchName,
    /// Directory holding one file per proposal.
    pub proposals_dir: String,
    /// Extension of proposal files, without the dot.
    pub file_extension: String,
    /// Prepended to the proposal id to form the branch name.
    pub branch_prefix: String,
}

impl PublishTarget {
    /// Points the pull request (and numbering) at the fork itself.
    pub fn into_dev_mode(self) -> Self {
        Self {
            upstream: self.fork.clone(),
            ..self
        }
    }

    fn branch_for(&self, proposal: &Proposal) -> Result<BranchName, PublishError> {
        let name = format!("{}{}", self.branch_prefix, proposal.id);
        BranchName::new(name.clone()).ok_or(PublishError::InvalidName(name))
    }

    fn path_for(&self, number: ProposalNumber) -> Result<ArtifactPath, PublishError> {
        let dir = self.proposals_dir.trim_end_matches('/');
        let path = format!("{dir}/{number}.{}", self.file_extension);
        ArtifactPath::new(path.clone()).ok_or(PublishError::InvalidName(path))
    }
}

/// Number-render-branch-commit-PR sequence for one proposal.
pub struct Publisher {
    repo: Arc<dyn DocsRepository>,
    formatter: Arc<dyn DocumentFormatter>,
    target: PublishTarget,
    term_reference: TermReference,
    numbering: NumberingPolicy,
    links: VotingLinks,
}

impl Publisher {
    pub fn new(
        repo: Arc<dyn DocsRepository>,
        formatter: Arc<dyn DocumentFormatter>,
        target: PublishTarget,
        term_reference: TermReference,
        numbering: NumberingPolicy,
        links: VotingLinks,
    ) -> Self {
        Self {
            repo,
            formatter,
            target,
            term_reference,
            numbering,
            links,
        }
    }

    /// Returns the publication target.
    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// Returns the voting links used in rendered documents.
    pub fn links(&self) -> &VotingLinks {
        &self.links
    }

    /// Computes the number the next proposal filed at `now` would receive.
    ///
    /// The result comes from a listing snapshot; two calls before a commit
    /// lands return the same number.
    pub async fn assign_number(&self, now: Timestamp) -> Result<ProposalNumber, PublishError> {
        let upstream = &self.target.upstream;
        let dir = &self.target.proposals_dir;
        let entries = self
            .repo
            .list_directory(upstream, &self.target.base_branch, dir)
            .await
            .map_err(|source| PublishError::Listing {
                repo: upstream.clone(),
                dir: dir.clone(),
                source,
            })?;

        let term = current_term(now, self.term_reference);
        let number = next_number(term, entries.iter().map(|e| e.name.as_str()), &self.numbering, now)?;
        debug!(%term, existing = entries.len(), %number, "assigned proposal number");
        Ok(number)
    }

    /// Publishes `proposal`.
    pub async fn publish(
        &self,
        proposal: &Proposal,
        now: Timestamp,
    ) -> Result<PublishOutcome, PublishError> {
        let number = self.assign_number(now).await?;
        let branch = self.target.branch_for(proposal)?;
        let path = self.target.path_for(number)?;

        let document = render(proposal, number, &self.links, self.formatter.as_ref())
            .map_err(|source| PublishError::Render { number, source })?;

        let fork = &self.target.fork;
        let base = self
            .repo
            .branch_head(fork, &self.target.base_branch)
            .await
            .map_err(|source| PublishError::BaseRef {
                repo: fork.clone(),
                branch: self.target.base_branch.clone(),
                source,
            })?;

        match self.repo.create_branch(fork, &branch, &base).await {
            Ok(()) => info!(%branch, %base, "created branch"),
            Err(RepositoryError::AlreadyExists { .. }) => {
                info!(%branch, "branch already exists, proposal was previously started");
                return Ok(PublishOutcome::AlreadyStarted { branch });
            }
            Err(source) => return Err(PublishError::Branch { branch, source }),
        }

        let label = format!("{} {number}", proposal.kind.number_prefix());
        let file = NewFile {
            branch: branch.clone(),
            path: path.clone(),
            content: document.into_content(),
            message: format!("Add {label}"),
        };
        let commit = match self.repo.create_file(fork, &file).await {
            Ok(commit) => commit,
            Err(RepositoryError::AlreadyExists { .. }) => {
                warn!(%branch, %path, "proposal file already exists");
                return Err(PublishError::FileCollision {
                    number,
                    branch,
                    path,
                });
            }
            Err(source) => return Err(PublishError::Commit { branch, path, source }),
        };
        debug!(%commit, %path, "committed proposal document");

        let pull_request = NewPullRequest {
            head: format!("{}:{branch}", fork.owner()),
            base: self.target.base_branch.clone(),
            title: format!("Add {label}"),
            body: format!(
                "Adds {label} to the proposal archive.\n\nVote: {}\n\n_Opened automatically by propscribe._",
                self.links.primary(proposal.kind, &proposal.id),
            ),
        };
        let url = self
            .repo
            .open_pull_request(&self.target.upstream, &pull_request)
            .await
            .map_err(|source| PublishError::PullRequest {
                branch: branch.clone(),
                commit: commit.clone(),
                source,
            })?;
        info!(pull_request = %url, %number, "opened pull request");

        Ok(PublishOutcome::Published(PublicationArtifact {
            number,
            branch,
            path,
            commit,
            pull_request: url,
        }))
    }
}

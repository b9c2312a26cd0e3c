//! Port traits implemented by infrastructure crates.
//!
//! The orchestrator depends only on these traits; concrete adapters live in
//! the `github`, `feeds`, `notify`, and `store` crates.

use async_trait::async_trait;

use crate::{
    BranchName, ChannelId, CommitSha, DirectoryEntry, NewFile, NewPullRequest, NotifyError,
    Proposal, ProposalId, PullRequestUrl, RepositoryError, RepositoryId, SourceError, StoreError,
};

/// Yields proposals observed since an implicit watermark.
///
/// Results may overlap with earlier calls; de-duplication is the caller's job.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    /// Fetches the current batch of candidate proposals.
    async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError>;
}

/// Durable record of proposals that have been fully processed.
///
/// `exists` and `record` are independent calls with no atomicity between them.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Returns `true` if a marker exists for `id`.
    async fn exists(&self, id: &ProposalId) -> Result<bool, StoreError>;

    /// Writes the marker for `id`. Recording an existing id is a no-op.
    async fn record(&self, id: &ProposalId) -> Result<(), StoreError>;
}

/// Sends human-readable alerts to a chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` to `channel`.
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<(), NotifyError>;
}

/// Content and pull-request operations on a hosted Git repository.
#[async_trait]
pub trait DocsRepository: Send + Sync {
    /// Lists the entries of the directory at `path` as of the tip of `branch`.
    ///
    /// Fails with [`RepositoryError::NotADirectory`] when `path` is a file.
    async fn list_directory(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, RepositoryError>;

    /// Returns the commit at the tip of `branch`.
    async fn branch_head(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
    ) -> Result<CommitSha, RepositoryError>;

    /// Creates `branch` pointing at `from`.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] when the branch exists.
    async fn create_branch(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        from: &CommitSha,
    ) -> Result<(), RepositoryError>;

    /// Commits a new file, returning the commit SHA.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] when the path is taken.
    async fn create_file(
        &self,
        repo: &RepositoryId,
        file: &NewFile,
    ) -> Result<CommitSha, RepositoryError>;

    /// Opens a pull request on `repo`, returning its URL.
    async fn open_pull_request(
        &self,
        repo: &RepositoryId,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestUrl, RepositoryError>;
}

//! In-memory fakes for the orchestrator ports.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use orchestrator::{PublishTarget, Publisher, RunController, RunSettings};
use pipeline::{
    BranchName, ChannelId, CommitSha, DirectoryEntry, DocsRepository, EntryKind, MdxFormatter,
    NewFile, NewPullRequest, Notifier, NotifyError, NumberingPolicy, Proposal, ProposalId,
    ProposalKind, ProposalSource, PullRequestUrl, RepositoryError, RepositoryId, SeenStore,
    SourceError, TermReference, Timestamp, VotingLinks,
};
use store::MemorySeenStore;

pub const PROPOSALS_DIR: &str = "src/pages/dao/proposals";

pub fn fork() -> RepositoryId {
    RepositoryId::new("scribe-bot", "docs").unwrap()
}

pub fn upstream() -> RepositoryId {
    RepositoryId::new("ensdomains", "docs").unwrap()
}

/// A moment in 2026, which is term 7 for [`term_reference`].
pub fn now() -> Timestamp {
    Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
}

pub fn term_reference() -> TermReference {
    TermReference {
        year: 2025,
        term: 6,
    }
}

pub fn proposal(id: &str, title: &str) -> Proposal {
    Proposal {
        id: ProposalId::new(id).unwrap(),
        kind: ProposalKind::Social,
        author: "alice.eth".to_string(),
        title: Some(title.to_string()),
        body: format!("# {title}\n\nDetails..."),
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFile {
    pub repo: RepositoryId,
    pub branch: String,
    pub path: String,
    pub text: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPullRequest {
    pub repo: RepositoryId,
    pub request: NewPullRequest,
}

#[derive(Debug, Default)]
pub struct RepoState {
    /// File names in the proposals directory on the main line.
    pub main_files: Vec<String>,
    /// `"owner/name:branch"` of every created branch.
    pub branches: BTreeSet<String>,
    pub commits: Vec<CommittedFile>,
    pub pull_requests: Vec<OpenedPullRequest>,
    pub listed_repos: Vec<RepositoryId>,
    pub listed_branches: Vec<String>,

    pub fail_listing: bool,
    pub listing_is_file: bool,
    pub fail_commit: bool,
    pub fail_pull_request: bool,
    /// Added to the main line right after the next listing is served.
    pub lands_after_listing: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeRepository {
    pub state: Mutex<RepoState>,
}

impl FakeRepository {
    pub fn with_files(files: &[&str]) -> Arc<Self> {
        let repo = Self::default();
        repo.state.lock().unwrap().main_files = files.iter().map(|f| f.to_string()).collect();
        Arc::new(repo)
    }

    pub fn update(&self, f: impl FnOnce(&mut RepoState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn branch_count(&self) -> usize {
        self.state.lock().unwrap().branches.len()
    }

    pub fn commits(&self) -> Vec<CommittedFile> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn pull_requests(&self) -> Vec<OpenedPullRequest> {
        self.state.lock().unwrap().pull_requests.clone()
    }
}

#[async_trait]
impl DocsRepository for FakeRepository {
    async fn list_directory(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.listed_repos.push(repo.clone());
        state.listed_branches.push(branch.to_string());
        if state.fail_listing {
            return Err(RepositoryError::Network("connection refused".into()));
        }
        if state.listing_is_file {
            return Err(RepositoryError::NotADirectory {
                path: path.to_string(),
            });
        }
        let entries = state
            .main_files
            .iter()
            .map(|name| DirectoryEntry {
                name: name.clone(),
                kind: EntryKind::File,
            })
            .collect();
        if let Some(landed) = state.lands_after_listing.take() {
            state.main_files.push(landed);
        }
        Ok(entries)
    }

    async fn branch_head(
        &self,
        _repo: &RepositoryId,
        _branch: &BranchName,
    ) -> Result<CommitSha, RepositoryError> {
        Ok(CommitSha::new("0000000000000000000000000000000000000001").unwrap())
    }

    async fn create_branch(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        _from: &CommitSha,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.insert(format!("{repo}:{branch}")) {
            return Err(RepositoryError::AlreadyExists {
                resource: format!("branch '{branch}'"),
            });
        }
        Ok(())
    }

    async fn create_file(
        &self,
        repo: &RepositoryId,
        file: &NewFile,
    ) -> Result<CommitSha, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(RepositoryError::Api {
                status: 500,
                message: "internal error".into(),
            });
        }
        let name = file.path.as_str().rsplit('/').next().unwrap_or_default().to_string();
        let on_branch = state
            .commits
            .iter()
            .any(|c| c.branch == file.branch.as_str() && c.path == file.path.as_str());
        if state.main_files.contains(&name) || on_branch {
            return Err(RepositoryError::AlreadyExists {
                resource: format!("file '{}'", file.path),
            });
        }
        state.commits.push(CommittedFile {
            repo: repo.clone(),
            branch: file.branch.to_string(),
            path: file.path.to_string(),
            text: file.content.decode().unwrap(),
            message: file.message.clone(),
        });
        Ok(CommitSha::new(format!("{:040x}", state.commits.len() + 1)).unwrap())
    }

    async fn open_pull_request(
        &self,
        repo: &RepositoryId,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestUrl, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_pull_request {
            return Err(RepositoryError::Api {
                status: 422,
                message: "Validation Failed".into(),
            });
        }
        state.pull_requests.push(OpenedPullRequest {
            repo: repo.clone(),
            request: pull_request.clone(),
        });
        let url = format!("https://github.com/{repo}/pull/{}", state.pull_requests.len());
        Ok(PullRequestUrl::new(url).unwrap())
    }
}

// ---------------------------------------------------------------------------
// Source and notifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeSource {
    pub proposals: Mutex<Vec<Proposal>>,
    pub fail: Mutex<bool>,
}

impl FakeSource {
    pub fn with(proposals: Vec<Proposal>) -> Arc<Self> {
        Arc::new(Self {
            proposals: Mutex::new(proposals),
            fail: Mutex::new(false),
        })
    }
}

#[async_trait]
impl ProposalSource for FakeSource {
    async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError> {
        if *self.fail.lock().unwrap() {
            return Err(SourceError::Network {
                source_name: "fake".into(),
                message: "timed out".into(),
            });
        }
        Ok(self.proposals.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<(ChannelId, String)>>,
    pub fail: bool,
}

impl FakeNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((channel.clone(), text.to_string()));
        if self.fail {
            return Err(NotifyError::Api {
                status: 403,
                message: "bot was blocked".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn target() -> PublishTarget {
    PublishTarget {
        fork: fork(),
        upstream: upstream(),
        base_branch: BranchName::new("main").unwrap(),
        proposals_dir: PROPOSALS_DIR.to_string(),
        file_extension: "mdx".to_string(),
        branch_prefix: "prop/".to_string(),
    }
}

pub fn publisher_for(repo: Arc<FakeRepository>, target: PublishTarget) -> Publisher {
    Publisher::new(
        repo,
        Arc::new(MdxFormatter),
        target,
        term_reference(),
        NumberingPolicy::default(),
        VotingLinks::default(),
    )
}

pub struct Harness {
    pub repo: Arc<FakeRepository>,
    pub source: Arc<FakeSource>,
    pub seen: Arc<MemorySeenStore>,
    pub notifier: Arc<FakeNotifier>,
    pub controller: RunController,
}

pub fn harness(repo: Arc<FakeRepository>, source: Arc<FakeSource>) -> Harness {
    harness_with(repo, source, Arc::new(MemorySeenStore::default()), FakeNotifier::default(), 5)
}

pub fn harness_with(
    repo: Arc<FakeRepository>,
    source: Arc<FakeSource>,
    seen: Arc<MemorySeenStore>,
    notifier: FakeNotifier,
    max_per_run: usize,
) -> Harness {
    let notifier = Arc::new(notifier);
    let controller = RunController::new(
        source.clone(),
        seen.clone() as Arc<dyn SeenStore>,
        notifier.clone(),
        publisher_for(repo.clone(), target()),
        RunSettings {
            channel: ChannelId::new("-100123").unwrap(),
            max_per_run,
        },
    );
    Harness {
        repo,
        source,
        seen,
        notifier,
        controller,
    }
}

//! propscribe GitHub infrastructure adapter.
//!
//! Implements [`pipeline::DocsRepository`] against the GitHub REST API using
//! `reqwest`:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `list_directory` | `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}` |
//! | `branch_head` | `GET /repos/{owner}/{repo}/git/ref/heads/{branch}` |
//! | `create_branch` | `POST /repos/{owner}/{repo}/git/refs` |
//! | `create_file` | `PUT /repos/{owner}/{repo}/contents/{path}` |
//! | `open_pull_request` | `POST /repos/{owner}/{repo}/pulls` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! Authentication, rate-limit headers, and response shapes are handled here;
//! the [`pipeline`] crate never sees them.
//!
//! The contents endpoint returns at most 1000 entries per directory. A
//! proposals directory larger than that would be under-counted.

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    BranchName, CommitSha, DirectoryEntry, DocsRepository, NewFile, NewPullRequest,
    PullRequestUrl, RepositoryError, RepositoryId, Timestamp,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{
    classify, ContentsResponse, CreateFileRequest, CreateFileResponse, CreatePullRequest,
    CreateRefRequest, PullRequestResponse, RefResponse,
};

/// Public GitHub API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("propscribe/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub REST client authenticated with a personal access or app token.
pub struct GithubClient {
    http: Client,
    api_base: String,
    token: String,
}

impl GithubClient {
    /// Creates a client for the public GitHub API.
    pub fn new(token: impl Into<String>) -> Result<Self, RepositoryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RepositoryError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        })
    }

    /// Points the client at a different API root (GitHub Enterprise).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, repo: &RepositoryId, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name(),
            tail.trim_start_matches('/')
        )
    }

    fn listing_request(&self, repo: &RepositoryId, branch: &BranchName, path: &str) -> RequestBuilder {
        let url = self.url(repo, &format!("contents/{}", path.trim_matches('/')));
        self.http.get(url).query(&[("ref", branch.as_str())])
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Sends `request` and returns the response if it succeeded.
    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response, RepositoryError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let err = classify(status, &headers, &body, resource, Timestamp::now().unix_seconds());
        debug!(%status, resource, error = %err, "GitHub request failed");
        Err(err)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, RepositoryError> {
        response
            .json()
            .await
            .map_err(|e| RepositoryError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl DocsRepository for GithubClient {
    async fn list_directory(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, RepositoryError> {
        debug!(%repo, %branch, path, "listing directory");
        let response = self
            .send(
                self.listing_request(repo, branch, path),
                &format!("path '{path}' on {branch} in {repo}"),
            )
            .await?;
        Self::json::<ContentsResponse>(response)
            .await?
            .into_entries(path)
    }

    async fn branch_head(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
    ) -> Result<CommitSha, RepositoryError> {
        let url = self.url(repo, &format!("git/ref/heads/{branch}"));
        let response = self
            .send(self.http.get(&url), &format!("branch '{branch}' in {repo}"))
            .await?;
        let reference: RefResponse = Self::json(response).await?;
        CommitSha::new(reference.object.sha)
            .ok_or_else(|| RepositoryError::InvalidResponse("empty ref sha".into()))
    }

    async fn create_branch(
        &self,
        repo: &RepositoryId,
        branch: &BranchName,
        from: &CommitSha,
    ) -> Result<(), RepositoryError> {
        let url = self.url(repo, "git/refs");
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha: from.as_str(),
        };
        self.send(self.http.post(&url).json(&body), &format!("branch '{branch}'"))
            .await?;
        Ok(())
    }

    async fn create_file(
        &self,
        repo: &RepositoryId,
        file: &NewFile,
    ) -> Result<CommitSha, RepositoryError> {
        let url = self.url(repo, &format!("contents/{}", file.path));
        let body = CreateFileRequest {
            message: &file.message,
            content: file.content.as_str(),
            branch: file.branch.as_str(),
        };
        let response = self
            .send(self.http.put(&url).json(&body), &format!("file '{}'", file.path))
            .await?;
        let created: CreateFileResponse = Self::json(response).await?;
        CommitSha::new(created.commit.sha)
            .ok_or_else(|| RepositoryError::InvalidResponse("empty commit sha".into()))
    }

    async fn open_pull_request(
        &self,
        repo: &RepositoryId,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestUrl, RepositoryError> {
        let url = self.url(repo, "pulls");
        let body = CreatePullRequest {
            title: &pull_request.title,
            head: &pull_request.head,
            base: pull_request.base.as_str(),
            body: &pull_request.body,
        };
        let response = self
            .send(
                self.http.post(&url).json(&body),
                &format!("pull request from '{}'", pull_request.head),
            )
            .await?;
        let created: PullRequestResponse = Self::json(response).await?;
        PullRequestUrl::new(created.html_url)
            .ok_or_else(|| RepositoryError::InvalidResponse("empty pull request url".into()))
    }
}

//! Request and response bodies of the GitHub REST endpoints we call, plus
//! the mapping from non-success responses to [`RepositoryError`].

use std::time::Duration;

use pipeline::{DirectoryEntry, EntryKind, RepositoryError};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Longest error body excerpt carried in [`RepositoryError::Api`].
const MAX_MESSAGE_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Contents
// ---------------------------------------------------------------------------

/// `GET /repos/{owner}/{repo}/contents/{path}` answers with an array for a
/// directory and an object for anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Directory(Vec<ContentEntry>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl ContentsResponse {
    pub(crate) fn into_entries(self, path: &str) -> Result<Vec<DirectoryEntry>, RepositoryError> {
        match self {
            Self::Directory(entries) => Ok(entries
                .into_iter()
                .map(|e| DirectoryEntry {
                    kind: match e.kind.as_str() {
                        "file" => EntryKind::File,
                        "dir" => EntryKind::Dir,
                        _ => EntryKind::Other,
                    },
                    name: e.name,
                })
                .collect()),
            Self::Other(_) => Err(RepositoryError::NotADirectory {
                path: path.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateFileRequest<'a> {
    pub message: &'a str,
    pub content: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateFileResponse {
    pub commit: ShaObject,
}

// ---------------------------------------------------------------------------
// Git refs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShaObject {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: &'a str,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CreatePullRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestResponse {
    pub html_url: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Maps a non-success response to a [`RepositoryError`].
///
/// `resource` names what the request was about and ends up in
/// `AlreadyExists`/`NotFound` messages. `now_unix` is used to turn the
/// `x-ratelimit-reset` epoch into a delay.
pub(crate) fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    resource: &str,
    now_unix: i64,
) -> RepositoryError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.chars().take(MAX_MESSAGE_CHARS).collect());

    let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        return RepositoryError::RateLimited {
            retry_after: rate_limit_delay(headers, now_unix),
        };
    }

    match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound {
            resource: resource.to_string(),
        },
        // Creating an existing ref: "Reference already exists".
        // Creating an existing file without its blob sha: "\"sha\" wasn't supplied."
        StatusCode::UNPROCESSABLE_ENTITY
            if message.contains("already exists") || message.contains("\"sha\" wasn't supplied") =>
        {
            RepositoryError::AlreadyExists {
                resource: resource.to_string(),
            }
        }
        _ => RepositoryError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn rate_limit_delay(headers: &HeaderMap, now_unix: i64) -> Option<Duration> {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }
    let reset = header_str(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
    Some(Duration::from_secs(u64::try_from(reset - now_unix).unwrap_or(0)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

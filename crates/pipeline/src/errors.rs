//! Retry-policy and port-level error types.
//!
//! The errors here are produced by implementations of the traits in
//! [`crate::ports`]. Domain computation errors (numbering, rendering,
//! formatting) are defined in their respective modules.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is expected to clear on a later tick.
///
/// Nothing is retried inside a run; a failed proposal stays unseen and the
/// next tick picks it up again. The policy tells the operator whether that
/// retry can succeed on its own.
///
/// - `Retryable` errors: network failures, rate limits, 5xx responses.
/// - `NonRetryable` errors: malformed documents, file collisions, orphaned
///   branches. These need manual intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may succeed on a later tick.
    Retryable {
        /// Minimum back-off before the next attempt, if the remote told us.
        after: Option<Duration>,
    },
    /// The operation will keep failing until a human intervenes.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    fn for_status(status: u16) -> Self {
        if status >= 500 || status == 408 {
            Self::Retryable { after: None }
        } else {
            Self::NonRetryable
        }
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`crate::DocsRepository`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RepositoryError {
    /// The ref or file being created already exists.
    #[error("{resource} already exists")]
    AlreadyExists {
        /// Human-readable name of the conflicting resource.
        resource: String,
    },

    /// The requested path or ref does not exist.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The listed path is a file, not a directory.
    #[error("expected a directory listing at '{path}'")]
    NotADirectory { path: String },

    /// Rate limit exceeded.
    #[error("rate limited by the repository API")]
    RateLimited {
        /// Time until the limit resets, when reported.
        retry_after: Option<Duration>,
    },

    /// Any other non-success status.
    #[error("repository API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RepositoryError {
    /// Classifies this error for the operator.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Network(_) => RetryPolicy::Retryable { after: None },
            Self::Api { status, .. } => RetryPolicy::for_status(*status),
            Self::AlreadyExists { .. }
            | Self::NotFound { .. }
            | Self::NotADirectory { .. }
            | Self::InvalidResponse(_) => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Proposal source
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`crate::ProposalSource`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    #[error("{source_name}: network error: {message}")]
    Network { source_name: String, message: String },

    #[error("{source_name}: API returned {status}: {message}")]
    Api {
        source_name: String,
        status: u16,
        message: String,
    },

    #[error("{source_name}: invalid response: {message}")]
    InvalidResponse { source_name: String, message: String },
}

impl SourceError {
    /// Classifies this error for the operator.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Network { .. } => RetryPolicy::Retryable { after: None },
            Self::Api { status, .. } => RetryPolicy::for_status(*status),
            Self::InvalidResponse { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Seen-set store
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`crate::SeenStore`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("seen-set store I/O failed: {0}")]
    Io(String),

    #[error("seen-set store is corrupt: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`crate::Notifier`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotifyError {
    #[error("notification network error: {0}")]
    Network(String),

    #[error("notification API returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = RepositoryError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        let client = RepositoryError::Api {
            status: 422,
            message: "unprocessable".into(),
        };
        assert!(server.retry_policy().is_retryable());
        assert_eq!(client.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn rate_limit_carries_reset_delay() {
        let err = RepositoryError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(30))
            }
        );
    }

    #[test]
    fn source_network_errors_are_retryable() {
        let err = SourceError::Network {
            source_name: "snapshot".into(),
            message: "connection reset".into(),
        };
        assert!(err.retry_policy().is_retryable());
    }
}

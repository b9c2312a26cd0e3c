//! propscribe proposal sources.
//!
//! Implements the [`pipeline::ProposalSource`] trait with three types:
//!
//! - [`SnapshotSource`]: off-chain (social) proposals from a Snapshot space,
//!   fetched through the Snapshot GraphQL hub.
//! - [`GovernorSource`]: on-chain (executable) proposals, read from the
//!   Governor contract's `ProposalCreated` event logs over Ethereum JSON-RPC.
//! - [`CombinedSource`]: concatenates the candidates of any number of sources
//!   and fails if any of them fails.
//!
//! Each source looks back over a fixed window (seconds for Snapshot, blocks
//! for the Governor). Overlap between successive fetches is expected; the run
//! controller de-duplicates against the seen-set store.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, query shapes, and ABI decoding all
//! live here. The [`pipeline`] crate sees only [`pipeline::ProposalSource`]
//! and [`pipeline::Proposal`].

mod combined;
mod governor;
mod snapshot;

pub use combined::CombinedSource;
pub use governor::{GovernorSource, PROPOSAL_CREATED_TOPIC};
pub use snapshot::{SnapshotSource, DEFAULT_SNAPSHOT_URL};

use std::time::Duration;

use pipeline::SourceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client(source_name: &str) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("propscribe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::Network {
            source_name: source_name.to_string(),
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Sends `request` and decodes a JSON body, mapping every failure to a
/// [`SourceError`] tagged with `source_name`.
async fn post_json<T: serde::de::DeserializeOwned>(
    source_name: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, SourceError> {
    let response = request.send().await.map_err(|e| SourceError::Network {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Api {
            source_name: source_name.to_string(),
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        });
    }

    response.json().await.map_err(|e| SourceError::InvalidResponse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

/// First markdown heading of `text`, without its `#` markers.
fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_is_extracted_without_markers() {
        assert_eq!(
            first_heading("intro\n\n## [EP 6.1] Fund X  \n\nbody").as_deref(),
            Some("[EP 6.1] Fund X")
        );
        assert_eq!(first_heading("no heading here"), None);
        assert_eq!(first_heading("#\n# Real"), Some("Real".to_string()));
    }
}

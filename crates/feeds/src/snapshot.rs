//! Social proposals from a Snapshot space.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{Proposal, ProposalId, ProposalKind, ProposalSource, SourceError, Timestamp};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Public Snapshot GraphQL hub.
pub const DEFAULT_SNAPSHOT_URL: &str = "https://hub.snapshot.org/graphql";

const SOURCE_NAME: &str = "snapshot";
const PAGE_SIZE: u32 = 100;

const PROPOSALS_QUERY: &str = "query Proposals($space: String!, $created: Int!, $first: Int!) {
  proposals(
    first: $first,
    where: { space: $space, created_gte: $created },
    orderBy: \"created\",
    orderDirection: asc
  ) {
    id
    title
    body
    author
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ProposalsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProposalsData {
    proposals: Vec<SnapshotProposal>,
}

#[derive(Debug, Deserialize)]
struct SnapshotProposal {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: String,
    author: String,
}

/// Polls one Snapshot space for proposals created within a lookback window.
pub struct SnapshotSource {
    http: reqwest::Client,
    url: String,
    space: String,
    lookback: Duration,
}

impl SnapshotSource {
    pub fn new(
        url: impl Into<String>,
        space: impl Into<String>,
        lookback: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http: crate::http_client(SOURCE_NAME)?,
            url: url.into(),
            space: space.into(),
            lookback,
        })
    }
}

#[async_trait]
impl ProposalSource for SnapshotSource {
    async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError> {
        let lookback = i64::try_from(self.lookback.as_secs()).unwrap_or(i64::MAX);
        let created_gte = Timestamp::now().unix_seconds().saturating_sub(lookback).max(0);
        let body = query_body(&self.space, created_gte);

        debug!(space = %self.space, created_gte, "querying Snapshot");
        let response: GraphqlResponse =
            crate::post_json(SOURCE_NAME, self.http.post(&self.url).json(&body)).await?;
        into_proposals(response)
    }
}

fn query_body(space: &str, created_gte: i64) -> serde_json::Value {
    json!({
        "query": PROPOSALS_QUERY,
        "variables": { "space": space, "created": created_gte, "first": PAGE_SIZE },
    })
}

fn into_proposals(response: GraphqlResponse) -> Result<Vec<Proposal>, SourceError> {
    if let Some(first) = response.errors.first() {
        return Err(SourceError::InvalidResponse {
            source_name: SOURCE_NAME.to_string(),
            message: first.message.clone(),
        });
    }
    let data = response.data.ok_or_else(|| SourceError::InvalidResponse {
        source_name: SOURCE_NAME.to_string(),
        message: "response has neither data nor errors".to_string(),
    })?;

    Ok(data
        .proposals
        .into_iter()
        .filter_map(|p| {
            let Some(id) = ProposalId::new(p.id.as_str()) else {
                warn!(id = %p.id, "skipping Snapshot proposal with unusable id");
                return None;
            };
            Some(Proposal {
                id,
                kind: ProposalKind::Social,
                author: p.author,
                title: p.title.filter(|t| !t.trim().is_empty()),
                body: p.body,
            })
        })
        .collect())
}

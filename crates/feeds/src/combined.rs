//! Fan-in over several proposal sources.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Proposal, ProposalSource, SourceError};
use tracing::debug;

/// Concatenates the candidates of every configured source, in order.
///
/// A single failing source fails the whole fetch; no partial batch is
/// returned.
pub struct CombinedSource {
    sources: Vec<Arc<dyn ProposalSource>>,
}

impl CombinedSource {
    pub fn new(sources: Vec<Arc<dyn ProposalSource>>) -> Self {
        Self { sources }
    }

    /// Returns the number of wrapped sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no source is configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl ProposalSource for CombinedSource {
    async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError> {
        let mut all = Vec::new();
        for source in &self.sources {
            let batch = source.fetch_candidates().await?;
            debug!(candidates = batch.len(), "source returned candidates");
            all.extend(batch);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{ProposalId, ProposalKind};

    use super::*;

    struct Fixed(Result<Vec<Proposal>, SourceError>);

    #[async_trait]
    impl ProposalSource for Fixed {
        async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError> {
            self.0.clone()
        }
    }

    fn proposal(id: &str, kind: ProposalKind) -> Proposal {
        Proposal {
            id: ProposalId::new(id).unwrap(),
            kind,
            author: "0x1".into(),
            title: None,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn concatenates_in_source_order() {
        let combined = CombinedSource::new(vec![
            Arc::new(Fixed(Ok(vec![proposal("0xa", ProposalKind::Social)]))),
            Arc::new(Fixed(Ok(vec![proposal("17", ProposalKind::Executable)]))),
        ]);
        let ids: Vec<String> = combined
            .fetch_candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, vec!["0xa", "17"]);
    }

    #[tokio::test]
    async fn any_failure_fails_the_fetch() {
        let combined = CombinedSource::new(vec![
            Arc::new(Fixed(Ok(vec![proposal("0xa", ProposalKind::Social)]))),
            Arc::new(Fixed(Err(SourceError::Network {
                source_name: "governor".into(),
                message: "timeout".into(),
            }))),
        ]);
        let err = combined.fetch_candidates().await.unwrap_err();
        assert!(err.retry_policy().is_retryable());
    }

    #[tokio::test]
    async fn empty_combination_yields_nothing() {
        let combined = CombinedSource::new(Vec::new());
        assert!(combined.is_empty());
        assert!(combined.fetch_candidates().await.unwrap().is_empty());
    }
}

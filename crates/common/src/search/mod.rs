//! Search gateway
//!
//! Issues one query against the document index and hands back the raw,
//! not yet re-ranked hits. Retrieval is best-effort: [`retrieve`] never
//! fails, it reports an unusable index as [`Retrieval::Unavailable`].

mod azure;
mod candidate;

pub use azure::{build_request_body, parse_search_response, AzureSearchClient};
pub use candidate::{Candidate, Fragment};

use crate::errors::Result;
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Query that matches every document
pub const WILDCARD_QUERY: &str = "*";

/// Search request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query; blank means match everything
    pub query: String,

    /// Maximum results to return
    pub top_k: usize,

    /// Fields to return (empty = index default)
    pub select: Vec<String>,

    /// OData filter expression
    pub filter: Option<String>,

    /// Ask for semantic ranking plus extractive answers and captions
    pub semantic: bool,

    /// Semantic configuration name
    pub semantic_config: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            select: Vec::new(),
            filter: None,
            semantic: false,
            semantic_config: None,
        }
    }

    /// The text actually sent to the index
    pub fn effective_query(&self) -> &str {
        if self.query.trim().is_empty() {
            WILDCARD_QUERY
        } else {
            &self.query
        }
    }
}

/// Outcome of a best-effort retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// At least one candidate, in index order
    Candidates(Vec<Candidate>),

    /// The index answered but matched nothing
    Empty,

    /// The index could not be queried
    Unavailable { reason: String },
}

impl Retrieval {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Retrieval::Candidates(candidates) => candidates,
            Retrieval::Empty | Retrieval::Unavailable { .. } => &[],
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Retrieval::Candidates(_) => "hits",
            Retrieval::Empty => "empty",
            Retrieval::Unavailable { .. } => "unavailable",
        }
    }
}

/// Common trait for document indexes
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one query and return hits in the order the index ranked them
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>>;

    /// Short name used in logs and metrics
    fn name(&self) -> &str;
}

/// Query `backend`, folding every failure into [`Retrieval::Unavailable`]
pub async fn retrieve(backend: &dyn SearchBackend, query: &SearchQuery) -> Retrieval {
    let start = Instant::now();

    let retrieval = match backend.search(query).await {
        Ok(candidates) if candidates.is_empty() => Retrieval::Empty,
        Ok(candidates) => Retrieval::Candidates(candidates),
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                error = %e,
                "Search request failed, continuing without context"
            );
            Retrieval::Unavailable {
                reason: e.to_string(),
            }
        }
    };

    let elapsed = start.elapsed();
    metrics::record_search(
        elapsed.as_secs_f64(),
        retrieval.outcome(),
        retrieval.candidates().len(),
    );

    tracing::info!(
        backend = backend.name(),
        outcome = retrieval.outcome(),
        results = retrieval.candidates().len(),
        latency_ms = elapsed.as_millis() as u64,
        "Search completed"
    );

    retrieval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use serde_json::Map;

    struct FixedSearch(Vec<Candidate>);

    #[async_trait]
    impl SearchBackend for FixedSearch {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchBackend for BrokenSearch {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<Candidate>> {
            Err(AppError::Search {
                message: "connection refused".to_string(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_blank_query_becomes_wildcard() {
        assert_eq!(SearchQuery::new("", 5).effective_query(), "*");
        assert_eq!(SearchQuery::new("  \n", 5).effective_query(), "*");
        assert_eq!(SearchQuery::new("rust", 5).effective_query(), "rust");
    }

    #[tokio::test]
    async fn test_retrieve_hits() {
        let backend = FixedSearch(vec![Candidate::new(Map::new()).with_score(1.0)]);
        let retrieval = retrieve(&backend, &SearchQuery::new("q", 5)).await;
        assert_eq!(retrieval.candidates().len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_empty() {
        let backend = FixedSearch(Vec::new());
        let retrieval = retrieve(&backend, &SearchQuery::new("q", 5)).await;
        assert_eq!(retrieval, Retrieval::Empty);
    }

    #[test]
    fn test_retrieve_failure_is_unavailable() {
        let retrieval = tokio_test::block_on(retrieve(&BrokenSearch, &SearchQuery::new("q", 5)));
        match retrieval {
            Retrieval::Unavailable { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}

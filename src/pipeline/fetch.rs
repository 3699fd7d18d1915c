//! Hand-off of the final page to the fetch phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardFailure};
use crate::pipeline::context::ShardContexts;
use crate::rank::RankedDocument;

/// Final ranked page plus the request accounting the fetch phase reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResults {
    pub request_id: String,
    pub hits: Vec<RankedDocument>,
    pub total_hits: u64,
    pub successful_shards: usize,
    pub total_shards: usize,
    pub shard_failures: Vec<ShardFailure>,
    pub took_ms: u64,
}

/// Response returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub request_id: String,

    /// Final page, ranks assigned.
    pub hits: Vec<RankedDocument>,

    /// Hits reported by the query phase; independent of `hits.len()`.
    pub total_hits: u64,

    pub successful_shards: usize,
    pub total_shards: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shard_failures: Vec<ShardFailure>,

    pub took_ms: u64,
}

impl SearchResponse {
    /// Doc ids of the returned page, in rank order.
    pub fn doc_ids(&self) -> Vec<u32> {
        self.hits.iter().map(|hit| hit.doc_id).collect()
    }

    /// Ranks of the returned page.
    pub fn ranks(&self) -> Vec<u32> {
        self.hits.iter().filter_map(|hit| hit.rank).collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.shard_failures.is_empty()
    }
}

/// Loads the documents of the final page.
///
/// Receives the contexts of the shards holding a final hit and owns their
/// release from here on.
#[async_trait]
pub trait FetchPhase: Send + Sync {
    async fn fetch(&self, results: RankedResults, contexts: ShardContexts)
    -> Result<SearchResponse>;
}

/// Returns the ranked hits as they are, without loading documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankedHitsFetch;

#[async_trait]
impl FetchPhase for RankedHitsFetch {
    async fn fetch(
        &self,
        results: RankedResults,
        mut contexts: ShardContexts,
    ) -> Result<SearchResponse> {
        contexts.release_all();
        Ok(SearchResponse {
            request_id: results.request_id,
            hits: results.hits,
            total_hits: results.total_hits,
            successful_shards: results.successful_shards,
            total_shards: results.total_shards,
            shard_failures: results.shard_failures,
            took_ms: results.took_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShardPhase;

    #[tokio::test]
    async fn test_ranked_hits_fetch_passes_through() {
        let mut hit = RankedDocument::new(4, 0.5, 1);
        hit.rank = Some(1);
        let results = RankedResults {
            request_id: "req".to_string(),
            hits: vec![hit],
            total_hits: 42,
            successful_shards: 1,
            total_shards: 2,
            shard_failures: vec![ShardFailure::new(0, ShardPhase::Query, "down")],
            took_ms: 3,
        };

        let response = RankedHitsFetch
            .fetch(results, ShardContexts::new())
            .await
            .unwrap();
        assert_eq!(response.doc_ids(), vec![4]);
        assert_eq!(response.ranks(), vec![1]);
        assert_eq!(response.total_hits, 42);
        assert!(response.is_partial());

        let json = serde_json::to_string(&response).unwrap();
        let decoded: SearchResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, response);
    }
}

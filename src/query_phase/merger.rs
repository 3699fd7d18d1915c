//! Coordinator-side merge of per-shard result sets.

use std::fmt::Debug;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};
use crate::rank::{GlobalResultSet, ShardResultSet, sort_total_order};

/// Statistics gathered while reducing query phase results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopDocsStats {
    /// Total hits reported by all successful shards.
    pub total_hits: u64,

    /// Number of documents retained by the merge.
    pub fetch_hits: usize,

    /// Shards that returned a query phase result.
    pub successful_shards: usize,

    /// Shards that failed during the query phase.
    pub failed_shards: usize,
}

impl TopDocsStats {
    /// Account one successful shard.
    pub fn add_shard(&mut self, total_hits: u64) {
        self.total_hits += total_hits;
        self.successful_shards += 1;
    }

    /// Account one failed shard.
    pub fn add_failure(&mut self) {
        self.failed_shards += 1;
    }
}

/// Merges per-shard result sets into one global result set.
pub trait CoordinatorMerger: Send + Sync + Debug {
    /// Maximum number of documents kept.
    fn window_size(&self) -> usize;

    /// Merge the shard results and record the retained count in `stats`.
    ///
    /// The output must not depend on the order of `shard_results`.
    fn merge(
        &self,
        shard_results: Vec<ShardResultSet>,
        stats: &mut TopDocsStats,
    ) -> Result<GlobalResultSet>;
}

/// Keeps the global top `window_size` documents by the total order.
#[derive(Debug, Clone)]
pub struct TopWindowMerger {
    size: usize,
    from: usize,
    window_size: usize,
}

impl TopWindowMerger {
    /// Create a new merger.
    pub fn new(size: usize, from: usize, window_size: usize) -> Self {
        Self {
            size,
            from,
            window_size,
        }
    }

    /// Requested page size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Requested page offset.
    pub fn offset(&self) -> usize {
        self.from
    }
}

impl CoordinatorMerger for TopWindowMerger {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn merge(
        &self,
        shard_results: Vec<ShardResultSet>,
        stats: &mut TopDocsStats,
    ) -> Result<GlobalResultSet> {
        if self.window_size == 0 {
            return Err(RankError::coordination(
                "window_size must be greater than zero",
            ));
        }

        let capacity = shard_results.iter().map(|r| r.len()).sum();
        let mut merged: GlobalResultSet = Vec::with_capacity(capacity);
        for docs in shard_results {
            merged.extend(docs);
        }

        sort_total_order(&mut merged);

        // A shard reporting the same doc twice keeps its best-ranked entry.
        let mut seen = AHashSet::with_capacity(merged.len());
        merged.retain(|doc| seen.insert(doc.key()));
        merged.truncate(self.window_size);

        stats.fetch_hits = merged.len();
        Ok(merged)
    }
}

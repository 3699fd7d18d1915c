//! Shard request and response messages.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::CancellationFlag;
use crate::rank::ShardResultSet;
use crate::shard::context::ShardContextId;
use crate::strategy::RankingStrategy;

/// Run the query phase on one shard.
#[derive(Clone)]
pub struct ShardQueryRequest {
    pub shard_index: usize,
    pub strategy: Arc<dyn RankingStrategy>,
    pub cancellation: CancellationFlag,
}

impl ShardQueryRequest {
    pub fn new(
        shard_index: usize,
        strategy: Arc<dyn RankingStrategy>,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            shard_index,
            strategy,
            cancellation,
        }
    }
}

impl fmt::Debug for ShardQueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardQueryRequest")
            .field("shard_index", &self.shard_index)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Query phase result of one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardQueryResult {
    pub shard_index: usize,
    pub context_id: ShardContextId,
    pub docs: ShardResultSet,
    pub total_hits: u64,
}

/// Extract features for the surviving documents of one shard.
#[derive(Clone)]
pub struct ShardFeatureRequest {
    pub shard_index: usize,
    pub context_id: ShardContextId,
    /// Sorted ascending.
    pub doc_ids: Vec<u32>,
    pub strategy: Arc<dyn RankingStrategy>,
    pub cancellation: CancellationFlag,
}

impl ShardFeatureRequest {
    /// Create a request; `doc_ids` are sorted and deduplicated.
    pub fn new(
        shard_index: usize,
        context_id: ShardContextId,
        mut doc_ids: Vec<u32>,
        strategy: Arc<dyn RankingStrategy>,
        cancellation: CancellationFlag,
    ) -> Self {
        doc_ids.sort_unstable();
        doc_ids.dedup();
        Self {
            shard_index,
            context_id,
            doc_ids,
            strategy,
            cancellation,
        }
    }
}

impl fmt::Debug for ShardFeatureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardFeatureRequest")
            .field("shard_index", &self.shard_index)
            .field("context_id", &self.context_id)
            .field("doc_ids", &self.doc_ids)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

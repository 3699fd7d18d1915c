//! Ranked documents and their identity.

use serde::{Deserialize, Serialize};

use crate::rank::feature::FeatureValue;

/// Composite identity of a document across shards.
///
/// Doc ids are only unique within one shard, so lookups and deduplication
/// across shards always key on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankKey {
    pub doc_id: u32,
    pub shard_index: usize,
}

impl RankKey {
    pub fn new(doc_id: u32, shard_index: usize) -> Self {
        Self {
            doc_id,
            shard_index,
        }
    }
}

/// A candidate document moving through the ranking rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    /// Shard-local document id.
    pub doc_id: u32,

    /// Current score. Replaced by the final score during rerank.
    pub score: f32,

    /// Index of the shard holding the document.
    pub shard_index: usize,

    /// 1-based rank, assigned only at finalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,

    /// Feature values in requested field order, absent until the feature phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_payload: Option<Vec<FeatureValue>>,
}

impl RankedDocument {
    /// Create a new document without rank or payload.
    pub fn new(doc_id: u32, score: f32, shard_index: usize) -> Self {
        Self {
            doc_id,
            score,
            shard_index,
            rank: None,
            feature_payload: None,
        }
    }

    /// Attach a feature payload.
    pub fn with_payload(mut self, payload: Vec<FeatureValue>) -> Self {
        self.feature_payload = Some(payload);
        self
    }

    /// Identity of this document.
    pub fn key(&self) -> RankKey {
        RankKey::new(self.doc_id, self.shard_index)
    }

    /// Whether the feature phase attached a payload.
    pub fn has_payload(&self) -> bool {
        self.feature_payload.is_some()
    }
}

/// Ordered documents from one shard, at most `window_size` long.
pub type ShardResultSet = Vec<RankedDocument>;

/// Ordered documents merged across all shards, at most `window_size` long.
pub type GlobalResultSet = Vec<RankedDocument>;

/// The documents one shard was asked about, now carrying feature payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBatch {
    pub shard_index: usize,
    pub docs: Vec<RankedDocument>,
}

impl FeatureBatch {
    pub fn new(shard_index: usize, docs: Vec<RankedDocument>) -> Self {
        Self { shard_index, docs }
    }

    pub fn empty(shard_index: usize) -> Self {
        Self::new(shard_index, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

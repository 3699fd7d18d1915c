//! Shard-local retrieval collaborator.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::feature_phase::DocumentSource;
use crate::query_phase::CandidateList;

/// Candidate lists produced on one shard, plus the shard's hit count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateLists {
    pub lists: Vec<CandidateList>,
    pub total_hits: u64,
}

/// Query execution and stored field access for one shard.
pub trait ShardSearcher: DocumentSource {
    /// Run the shard's candidate generators.
    fn candidate_lists(&self) -> Result<CandidateLists>;
}

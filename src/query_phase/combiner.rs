//! Shard-local combination of candidate lists.

use std::cmp::Ordering;
use std::fmt::Debug;

use ahash::AHashMap;

use crate::error::{RankError, Result};
use crate::rank::{RankedDocument, ShardResultSet, cmp_score_desc, sort_total_order};

/// One candidate generator's output on a shard: `(doc_id, score)` pairs.
pub type CandidateList = Vec<(u32, f32)>;

/// Merges the candidate lists of one shard into a bounded result set.
pub trait ShardCombiner: Send + Sync + Debug {
    /// Maximum number of documents kept.
    fn window_size(&self) -> usize;

    /// Combine the candidate lists of shard `shard_index`.
    fn combine(&self, shard_index: usize, lists: Vec<CandidateList>) -> Result<ShardResultSet>;
}

/// Keeps the maximum score of every doc id seen in any list.
#[derive(Debug, Clone)]
pub struct MaxScoreCombiner {
    window_size: usize,
    min_score: Option<f32>,
}

impl MaxScoreCombiner {
    /// Create a new combiner that keeps at most `window_size` documents.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            min_score: None,
        }
    }

    /// Drop documents whose best score is below `min_score`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }
}

impl ShardCombiner for MaxScoreCombiner {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn combine(&self, shard_index: usize, lists: Vec<CandidateList>) -> Result<ShardResultSet> {
        if self.window_size == 0 {
            return Err(RankError::invalid_operation(
                "window_size must be greater than zero",
            ));
        }

        let capacity = lists.iter().map(|l| l.len()).sum();
        let mut best: AHashMap<u32, f32> = AHashMap::with_capacity(capacity);

        for list in lists {
            for (doc_id, score) in list {
                best.entry(doc_id)
                    .and_modify(|current| {
                        if cmp_score_desc(score, *current) == Ordering::Less {
                            *current = score;
                        }
                    })
                    .or_insert(score);
            }
        }

        let mut docs: ShardResultSet = best
            .into_iter()
            .filter(|(_, score)| self.min_score.is_none_or(|min| *score >= min))
            .map(|(doc_id, score)| RankedDocument::new(doc_id, score, shard_index))
            .collect();

        sort_total_order(&mut docs);
        docs.truncate(self.window_size);

        Ok(docs)
    }
}

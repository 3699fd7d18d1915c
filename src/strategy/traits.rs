//! The pluggable ranking strategy contract.

use std::fmt::Debug;

use crate::error::Result;
use crate::feature_phase::{FeatureExtractor, RerankCoordinator};
use crate::query_phase::{CoordinatorMerger, MaxScoreCombiner, ShardCombiner, TopWindowMerger};
use crate::strategy::config::StrategyConfig;

/// A ranking strategy: a factory for the pieces that run in each round.
///
/// One strategy value is shared read-only by the coordinator and every
/// shard of a request. Shards call [`build_shard_combiner`] and
/// [`build_feature_extractor`]; the coordinator calls
/// [`build_coordinator_merger`] and [`build_rerank_coordinator`].
///
/// [`build_shard_combiner`]: RankingStrategy::build_shard_combiner
/// [`build_feature_extractor`]: RankingStrategy::build_feature_extractor
/// [`build_coordinator_merger`]: RankingStrategy::build_coordinator_merger
/// [`build_rerank_coordinator`]: RankingStrategy::build_rerank_coordinator
pub trait RankingStrategy: Send + Sync + Debug {
    /// The configuration this strategy was built from.
    fn config(&self) -> &StrategyConfig;

    /// Registered name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Number of candidates kept per shard and after the merge.
    fn window_size(&self) -> usize {
        self.config().window_size
    }

    /// Combiner used by every shard during the query phase.
    fn build_shard_combiner(&self) -> Box<dyn ShardCombiner> {
        Box::new(MaxScoreCombiner::new(self.window_size()).with_min_score(self.config().min_score))
    }

    /// Merger used by the coordinator at the end of the query phase.
    fn build_coordinator_merger(&self, size: usize, from: usize) -> Box<dyn CoordinatorMerger> {
        Box::new(TopWindowMerger::new(size, from, self.window_size()))
    }

    /// Extractor for the feature phase, or `None` to skip it.
    fn build_feature_extractor(&self) -> Option<Box<dyn FeatureExtractor>> {
        None
    }

    /// Rerank coordinator for the feature phase.
    ///
    /// Must return `Some` exactly when [`build_feature_extractor`] does.
    ///
    /// [`build_feature_extractor`]: RankingStrategy::build_feature_extractor
    fn build_rerank_coordinator(
        &self,
        _size: usize,
        _from: usize,
    ) -> Result<Option<Box<dyn RerankCoordinator>>> {
        Ok(None)
    }

    /// Whether this strategy runs a feature phase.
    fn has_feature_phase(&self) -> bool {
        self.build_feature_extractor().is_some()
    }
}

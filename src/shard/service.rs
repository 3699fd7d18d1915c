//! Shard-side execution of the query and feature phases.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{RankError, Result};
use crate::feature_phase::DocumentSource;
use crate::rank::FeatureBatch;
use crate::shard::context::{ContextRegistry, ShardContextId};
use crate::shard::request::{ShardFeatureRequest, ShardQueryRequest, ShardQueryResult};
use crate::shard::searcher::ShardSearcher;

/// Serves the ranking rounds for one shard.
pub struct ShardService {
    shard_index: usize,
    searcher: Arc<dyn ShardSearcher>,
    source: Arc<dyn DocumentSource>,
    contexts: ContextRegistry,
}

impl ShardService {
    /// Create a service for shard `shard_index`.
    pub fn new<S: ShardSearcher + 'static>(shard_index: usize, searcher: Arc<S>) -> Self {
        Self {
            shard_index,
            searcher: searcher.clone(),
            source: searcher,
            contexts: ContextRegistry::new(),
        }
    }

    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    /// Open search contexts on this shard.
    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    /// Combine the shard's candidate lists and retain the result.
    ///
    /// A context is opened only when the combine succeeded.
    pub fn execute_query_phase(&self, request: &ShardQueryRequest) -> Result<ShardQueryResult> {
        self.check_shard(request.shard_index)?;
        request.cancellation.check("shard query phase")?;

        let candidates = self
            .searcher
            .candidate_lists()
            .map_err(|err| self.shard_error(err))?;
        let combiner = request.strategy.build_shard_combiner();
        let docs = combiner
            .combine(self.shard_index, candidates.lists)
            .map_err(|err| self.shard_error(err))?;

        let context_id = self.contexts.open(docs.clone());
        debug!(
            "shard [{}] query phase kept {} of {} hits in [{}]",
            self.shard_index,
            docs.len(),
            candidates.total_hits,
            context_id
        );

        Ok(ShardQueryResult {
            shard_index: self.shard_index,
            context_id,
            docs,
            total_hits: candidates.total_hits,
        })
    }

    /// Extract feature payloads for the requested documents.
    pub fn execute_feature_phase(&self, request: &ShardFeatureRequest) -> Result<FeatureBatch> {
        self.check_shard(request.shard_index)?;
        request.cancellation.check("shard feature phase")?;

        let extractor = request.strategy.build_feature_extractor().ok_or_else(|| {
            RankError::invalid_operation(format!(
                "strategy [{}] has no feature phase",
                request.strategy.name()
            ))
        })?;

        let docs = self
            .contexts
            .docs(request.context_id, &request.doc_ids)
            .ok_or_else(|| {
                RankError::shard(
                    self.shard_index,
                    format!("search context [{}] not found", request.context_id),
                )
            })?;
        if docs.len() != request.doc_ids.len() {
            warn!(
                "shard [{}] asked for {} docs, context [{}] holds {}",
                self.shard_index,
                request.doc_ids.len(),
                request.context_id,
                docs.len()
            );
            return Err(RankError::shard(
                self.shard_index,
                format!(
                    "search context [{}] does not hold every requested document",
                    request.context_id
                ),
            ));
        }

        extractor.extract(self.shard_index, docs, self.source.as_ref())
    }

    /// Release a retained context. Idempotent.
    pub fn release_context(&self, context_id: ShardContextId) -> bool {
        self.contexts.release(context_id)
    }

    fn check_shard(&self, shard_index: usize) -> Result<()> {
        if shard_index != self.shard_index {
            return Err(RankError::invalid_operation(format!(
                "request for shard [{}] routed to shard [{}]",
                shard_index, self.shard_index
            )));
        }
        Ok(())
    }

    fn shard_error(&self, err: RankError) -> RankError {
        match err {
            RankError::ShardExecution { .. } | RankError::Cancelled(_) => err,
            other => RankError::shard(self.shard_index, other.message()),
        }
    }
}

impl fmt::Debug for ShardService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardService")
            .field("shard_index", &self.shard_index)
            .field("open_contexts", &self.contexts.outstanding())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CancellationFlag;
    use crate::rank::FeatureValue;
    use crate::shard::memory::InMemoryShard;
    use crate::strategy::{FieldScoreStrategy, StrategyConfig, TopWindowStrategy};

    fn shard() -> Arc<InMemoryShard> {
        Arc::new(
            InMemoryShard::new()
                .with_document(1, "rank", FeatureValue::Integer(1))
                .with_document(2, "rank", FeatureValue::Integer(2))
                .with_candidates(vec![(1, 0.5), (2, 0.9)]),
        )
    }

    fn field_score() -> Arc<FieldScoreStrategy> {
        Arc::new(FieldScoreStrategy::new(StrategyConfig::new("field_score").with_field("rank")).unwrap())
    }

    #[test]
    fn test_query_then_feature_phase() {
        let service = ShardService::new(0, shard());
        let strategy = field_score();
        let cancellation = CancellationFlag::new();

        let result = service
            .execute_query_phase(&ShardQueryRequest::new(0, strategy.clone(), cancellation.clone()))
            .unwrap();
        assert_eq!(result.docs.len(), 2);
        assert_eq!(result.docs[0].doc_id, 2);
        assert_eq!(result.total_hits, 2);
        assert_eq!(service.contexts().outstanding(), 1);

        let batch = service
            .execute_feature_phase(&ShardFeatureRequest::new(
                0,
                result.context_id,
                vec![2, 1],
                strategy,
                cancellation,
            ))
            .unwrap();
        assert_eq!(batch.docs.len(), 2);
        assert_eq!(batch.docs[0].doc_id, 1);
        assert_eq!(batch.docs[1].score, 0.9);

        assert!(service.release_context(result.context_id));
        assert_eq!(service.contexts().outstanding(), 0);
    }

    #[test]
    fn test_failed_query_phase_opens_no_context() {
        let searcher = Arc::new(InMemoryShard::new().with_candidate_failure("index corrupted"));
        let service = ShardService::new(0, searcher);
        let strategy = Arc::new(TopWindowStrategy::new(StrategyConfig::new("top_window")).unwrap());

        let result =
            service.execute_query_phase(&ShardQueryRequest::new(0, strategy, CancellationFlag::new()));
        assert!(matches!(
            result,
            Err(RankError::ShardExecution {
                shard_index: Some(0),
                ..
            })
        ));
        assert_eq!(service.contexts().outstanding(), 0);
    }

    #[test]
    fn test_unknown_context_fails() {
        let service = ShardService::new(0, shard());
        let request = ShardFeatureRequest::new(
            0,
            ShardContextId(42),
            vec![1],
            field_score(),
            CancellationFlag::new(),
        );
        assert!(service.execute_feature_phase(&request).is_err());
    }

    #[test]
    fn test_cancelled_request_is_rejected() {
        let service = ShardService::new(0, shard());
        let cancellation = CancellationFlag::new();
        cancellation.cancel();

        let result =
            service.execute_query_phase(&ShardQueryRequest::new(0, field_score(), cancellation));
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(service.contexts().outstanding(), 0);
    }
}

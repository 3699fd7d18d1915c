//! Coordinator for the multi-round ranking pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::error::{RankError, Result, ShardFailure, ShardPhase};
use crate::feature_phase::{Pagination, RerankCoordinator};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::{RequestContext, ResponseSlots, ShardContextGuard};
use crate::pipeline::fetch::{FetchPhase, RankedResults, SearchResponse};
use crate::pipeline::metrics::{PipelineMetricsCollector, RequestOutcome};
use crate::pipeline::request::PipelineRequest;
use crate::rank::{FeatureBatch, GlobalResultSet, RankedDocument};
use crate::shard::{ShardFeatureRequest, ShardQueryRequest, ShardQueryResult, ShardTransport};
use crate::strategy::StrategyPhase;

/// Runs ranking requests across the shards reachable through a transport.
pub struct PipelineOrchestrator {
    /// Configuration for the orchestrator.
    config: PipelineConfig,

    /// Transport to the shards.
    transport: Arc<dyn ShardTransport>,

    /// Metrics collector.
    metrics: Arc<PipelineMetricsCollector>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    pub fn new(config: PipelineConfig, transport: Arc<dyn ShardTransport>) -> Self {
        Self {
            config,
            transport,
            metrics: Arc::new(PipelineMetricsCollector::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Metrics collected so far.
    pub fn metrics(&self) -> &PipelineMetricsCollector {
        &self.metrics
    }

    /// Execute one ranking request and hand the final page to `fetch`.
    ///
    /// Every shard context opened for the request is released exactly once,
    /// whatever the outcome.
    pub async fn execute(
        &self,
        request: PipelineRequest,
        fetch: &dyn FetchPhase,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let mut ctx = RequestContext::new(self.transport.shard_count());
        info!(
            "[{}] ranking request: strategy [{}], size {}, from {}, {} shards",
            ctx.request_id,
            request.strategy.name(),
            request.size,
            request.from,
            ctx.total_shards
        );

        let result = self.run(&request, &mut ctx, fetch).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => info!(
                "[{}] returned {} hits of {} in {:?}",
                ctx.request_id,
                response.hits.len(),
                response.total_hits,
                elapsed
            ),
            Err(err) if err.is_cancelled() => info!("[{}] {}", ctx.request_id, err),
            Err(err) => warn!("[{}] request failed: {}", ctx.request_id, err),
        }

        if self.config.enable_metrics {
            let outcome = match &result {
                Ok(_) => RequestOutcome::Success,
                Err(err) if err.is_cancelled() => RequestOutcome::Cancelled,
                Err(_) => RequestOutcome::Failure,
            };
            let hits = result.as_ref().map(|r| r.hits.len() as u64).unwrap_or(0);
            self.metrics.record_request(
                elapsed,
                outcome,
                ctx.failures.len() as u64,
                ctx.stats.fetch_hits as u64,
                hits,
            );
        }

        result
    }

    async fn run(
        &self,
        request: &PipelineRequest,
        ctx: &mut RequestContext,
        fetch: &dyn FetchPhase,
    ) -> Result<SearchResponse> {
        let strategy = &request.strategy;
        let allow_partial = request
            .allow_partial_results
            .unwrap_or(self.config.allow_partial_results);

        request.cancellation.check("query phase")?;
        let merger = strategy.build_coordinator_merger(request.size, request.from);
        ctx.lifecycle.advance(StrategyPhase::QueryPhaseBuilt)?;

        let shard_results = self.query_phase(request, ctx).await;

        request.cancellation.check("merge")?;
        self.apply_failure_policy(ctx, shard_results.len(), allow_partial)?;

        let shard_sets = shard_results
            .into_iter()
            .map(|result| {
                ctx.stats.add_shard(result.total_hits);
                result.docs
            })
            .collect();
        let merged = merger
            .merge(shard_sets, &mut ctx.stats)
            .map_err(RankError::into_coordination)?;
        debug!(
            "[{}] merged query phase: {} docs retained of {} total hits",
            ctx.request_id,
            merged.len(),
            ctx.stats.total_hits
        );

        let hits = if strategy.has_feature_phase() {
            let rerank = strategy
                .build_rerank_coordinator(request.size, request.from)?
                .ok_or_else(|| {
                    RankError::invalid_operation(format!(
                        "strategy [{}] has a feature extractor but no rerank coordinator",
                        strategy.name()
                    ))
                })?;
            ctx.lifecycle.advance(StrategyPhase::FeaturePhaseBuilt)?;
            let hits = self
                .feature_phase(request, ctx, merged, rerank.as_ref(), allow_partial)
                .await?;
            ctx.lifecycle.advance(StrategyPhase::Finished)?;
            hits
        } else {
            ctx.lifecycle.advance(StrategyPhase::Finished)?;
            Pagination::new(request.size, request.from, strategy.window_size()).paginate(merged)
        };

        let final_shards: BTreeSet<usize> = hits.iter().map(|hit| hit.shard_index).collect();
        ctx.contexts.retain_shards(&final_shards);
        let contexts = std::mem::take(&mut ctx.contexts);

        let results = RankedResults {
            request_id: ctx.request_id.to_string(),
            hits,
            total_hits: ctx.stats.total_hits,
            successful_shards: ctx.stats.successful_shards,
            total_shards: ctx.total_shards,
            shard_failures: ctx.failures.clone(),
            took_ms: ctx.elapsed_ms(),
        };
        fetch.fetch(results, contexts).await
    }

    /// Fan the query phase out to every shard and collect the successes.
    ///
    /// Failures are captured in `ctx`. Contexts of successful shards are
    /// tracked in `ctx` before anything else can fail.
    async fn query_phase(
        &self,
        request: &PipelineRequest,
        ctx: &mut RequestContext,
    ) -> Vec<ShardQueryResult> {
        let requests: Vec<ShardQueryRequest> = (0..ctx.total_shards)
            .map(|shard_index| {
                ShardQueryRequest::new(
                    shard_index,
                    Arc::clone(&request.strategy),
                    request.cancellation.clone(),
                )
            })
            .collect();

        let slots = self
            .fan_out(requests, |request| {
                let shard_index = request.shard_index;
                (shard_index, self.transport.execute_query_phase(request))
            })
            .await;

        let mut results = Vec::new();
        for (shard_index, outcome) in slots {
            match outcome {
                Ok(result) => {
                    ctx.contexts.insert(ShardContextGuard::new(
                        Arc::clone(&self.transport),
                        result.shard_index,
                        result.context_id,
                    ));
                    results.push(result);
                }
                Err(err) => {
                    warn!(
                        "[{}] shard [{}] failed in query phase: {}",
                        ctx.request_id, shard_index, err
                    );
                    ctx.stats.add_failure();
                    ctx.record_failure(ShardFailure::from_error(
                        shard_index,
                        ShardPhase::Query,
                        &err,
                    ));
                }
            }
        }
        results
    }

    /// Run the feature phase and the rerank.
    async fn feature_phase(
        &self,
        request: &PipelineRequest,
        ctx: &mut RequestContext,
        merged: GlobalResultSet,
        rerank: &dyn RerankCoordinator,
        allow_partial: bool,
    ) -> Result<Vec<RankedDocument>> {
        request.cancellation.check("feature phase")?;

        let mut by_shard: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
        for doc in &merged {
            by_shard.entry(doc.shard_index).or_default().push(doc.doc_id);
        }
        let released = ctx
            .contexts
            .retain_shards(&by_shard.keys().copied().collect());
        debug!(
            "[{}] feature phase on {} shards, released {} unused contexts",
            ctx.request_id,
            by_shard.len(),
            released
        );

        let mut requests = Vec::with_capacity(by_shard.len());
        for (shard_index, doc_ids) in by_shard {
            let context_id = ctx.contexts.context_id(shard_index).ok_or_else(|| {
                RankError::invalid_operation(format!(
                    "no open context for shard [{shard_index}] holding merged documents"
                ))
            })?;
            requests.push(ShardFeatureRequest::new(
                shard_index,
                context_id,
                doc_ids,
                Arc::clone(&request.strategy),
                request.cancellation.clone(),
            ));
        }
        let dispatched = requests.len();

        let slots = self
            .fan_out(requests, |request| {
                let shard_index = request.shard_index;
                (shard_index, self.transport.execute_feature_phase(request))
            })
            .await;

        let mut batches: Vec<FeatureBatch> = Vec::with_capacity(dispatched);
        for (shard_index, outcome) in slots {
            match outcome {
                Ok(batch) => batches.push(batch),
                Err(err) => {
                    warn!(
                        "[{}] shard [{}] failed in feature phase: {}",
                        ctx.request_id, shard_index, err
                    );
                    ctx.contexts.release(shard_index);
                    ctx.record_failure(ShardFailure::from_error(
                        shard_index,
                        ShardPhase::Feature,
                        &err,
                    ));
                }
            }
        }

        request.cancellation.check("rerank")?;
        if dispatched > 0 {
            self.apply_failure_policy(ctx, batches.len(), allow_partial)?;
        }

        rerank
            .rank_global_results(batches)
            .await
            .map_err(RankError::into_coordination)
    }

    /// Dispatch one request per slot with bounded concurrency and wait for
    /// every response.
    ///
    /// Each call runs under the shard timeout; a timeout counts as that
    /// shard's failure. Responses are returned in dispatch order.
    async fn fan_out<Req, T, F, Fut>(
        &self,
        requests: Vec<Req>,
        dispatch: F,
    ) -> Vec<(usize, Result<T>)>
    where
        F: Fn(Req) -> (usize, Fut),
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.shard_timeout;
        let concurrency = self.config.max_concurrent_shard_requests.max(1);
        let mut slots = ResponseSlots::new(requests.len());

        let mut responses = stream::iter(requests.into_iter().enumerate())
            .map(|(slot, request)| {
                let (shard_index, call) = dispatch(request);
                async move {
                    let outcome = with_timeout(timeout, shard_index, call).await;
                    (slot, shard_index, outcome)
                }
            })
            .buffer_unordered(concurrency);

        while let Some((slot, shard_index, outcome)) = responses.next().await {
            if let Err(err) = slots.set(slot, (shard_index, outcome)) {
                warn!("dropping unexpected shard response: {err}");
            }
        }

        slots.into_responses()
    }

    /// Fail the request if the captured shard failures are terminal.
    fn apply_failure_policy(
        &self,
        ctx: &RequestContext,
        successes: usize,
        allow_partial: bool,
    ) -> Result<()> {
        if ctx.failures.is_empty() {
            return Ok(());
        }
        if successes == 0 || !allow_partial {
            return Err(RankError::from_shard_failures(ctx.failures.clone())
                .unwrap_or_else(|| RankError::internal("shard failures vanished")));
        }
        Ok(())
    }
}

async fn with_timeout<T, Fut>(timeout: Duration, shard_index: usize, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(RankError::timeout(format!(
            "shard [{shard_index}] did not answer within {timeout:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::RankedHitsFetch;
    use crate::rank::FeatureValue;
    use crate::shard::{InMemoryShard, LocalTransport, ShardService};
    use crate::strategy::{FieldScoreStrategy, StrategyConfig, TopWindowStrategy};

    fn transport(shards: Vec<InMemoryShard>) -> Arc<LocalTransport> {
        Arc::new(LocalTransport::new(
            shards
                .into_iter()
                .enumerate()
                .map(|(i, shard)| Arc::new(ShardService::new(i, Arc::new(shard))))
                .collect(),
        ))
    }

    fn scored_shard(docs: &[(u32, f32, f32)]) -> InMemoryShard {
        docs.iter().fold(
            InMemoryShard::new().with_candidates(
                docs.iter().map(|(id, score, _)| (*id, *score)).collect(),
            ),
            |shard, (id, _, value)| {
                shard.with_document(*id, "rank", FeatureValue::Float(*value as f64))
            },
        )
    }

    #[tokio::test]
    async fn test_top_window_paginates_merge() {
        let transport = transport(vec![
            scored_shard(&[(1, 0.9, 0.0), (2, 0.5, 0.0)]),
            scored_shard(&[(1, 0.7, 0.0)]),
        ]);
        let orchestrator = PipelineOrchestrator::new(PipelineConfig::default(), transport.clone());
        let strategy = Arc::new(TopWindowStrategy::new(StrategyConfig::new("top_window")).unwrap());

        let response = orchestrator
            .execute(PipelineRequest::new(strategy, 2), &RankedHitsFetch)
            .await
            .unwrap();

        let keys: Vec<(usize, u32)> = response
            .hits
            .iter()
            .map(|h| (h.shard_index, h.doc_id))
            .collect();
        assert_eq!(keys, vec![(0, 1), (1, 1)]);
        assert_eq!(response.ranks(), vec![1, 2]);
        assert_eq!(response.total_hits, 3);
        assert_eq!(transport.outstanding_contexts(), 0);
    }

    #[tokio::test]
    async fn test_field_score_reranks() {
        let transport = transport(vec![
            scored_shard(&[(1, 0.9, 0.1), (2, 0.5, 0.7)]),
            scored_shard(&[(3, 0.8, 0.4)]),
        ]);
        let orchestrator = PipelineOrchestrator::new(PipelineConfig::default(), transport.clone());
        let strategy = Arc::new(
            FieldScoreStrategy::new(StrategyConfig::new("field_score").with_field("rank")).unwrap(),
        );

        let response = orchestrator
            .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
            .await
            .unwrap();

        assert_eq!(response.doc_ids(), vec![2, 3, 1]);
        assert_eq!(response.ranks(), vec![1, 2, 3]);
        assert_eq!(transport.outstanding_contexts(), 0);
        assert_eq!(orchestrator.metrics().snapshot().successful_requests, 1);
    }

    #[tokio::test]
    async fn test_no_shards_returns_empty_page() {
        let orchestrator = PipelineOrchestrator::new(PipelineConfig::default(), transport(Vec::new()));
        let strategy = Arc::new(
            FieldScoreStrategy::new(StrategyConfig::new("field_score").with_field("rank")).unwrap(),
        );

        let response = orchestrator
            .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
            .await
            .unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.total_shards, 0);
    }

    #[tokio::test]
    async fn test_shard_timeout_is_a_shard_failure() {
        let transport = transport(vec![
            scored_shard(&[(1, 0.9, 0.0)]),
            scored_shard(&[(2, 0.8, 0.0)]).with_query_delay(Duration::from_millis(300)),
        ]);
        let config = PipelineConfig::default().with_shard_timeout(Duration::from_millis(20));
        let orchestrator = PipelineOrchestrator::new(config, transport.clone());
        let strategy = Arc::new(TopWindowStrategy::new(StrategyConfig::new("top_window")).unwrap());

        let response = orchestrator
            .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
            .await
            .unwrap();
        assert_eq!(response.doc_ids(), vec![1]);
        assert_eq!(response.shard_failures.len(), 1);
        assert_eq!(response.shard_failures[0].shard_index, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.outstanding_contexts(), 0);
    }
}

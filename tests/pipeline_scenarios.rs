use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;

use rankwise::error::{RankError, Result};
use rankwise::feature_phase::{ExternalScorer, NumericTextScorer, ScoringRequest};
use rankwise::pipeline::{
    CancellationFlag, PipelineConfig, PipelineOrchestrator, PipelineRequest, RankedHitsFetch,
    SearchResponse,
};
use rankwise::rank::FeatureValue;
use rankwise::shard::{InMemoryShard, LocalTransport, ShardService};
use rankwise::strategy::{RankingStrategy, StrategyConfig, StrategyRegistry, StrategyServices};

/// Shards kept alongside the transport so handle counts can be checked.
struct Cluster {
    shards: Vec<Arc<InMemoryShard>>,
    transport: Arc<LocalTransport>,
}

impl Cluster {
    fn new(shards: Vec<InMemoryShard>) -> Self {
        let shards: Vec<Arc<InMemoryShard>> = shards.into_iter().map(Arc::new).collect();
        let services = shards
            .iter()
            .enumerate()
            .map(|(index, shard)| Arc::new(ShardService::new(index, Arc::clone(shard))))
            .collect();
        Self {
            shards,
            transport: Arc::new(LocalTransport::new(services)),
        }
    }

    fn orchestrator(&self, config: PipelineConfig) -> PipelineOrchestrator {
        PipelineOrchestrator::new(config, self.transport.clone())
    }

    fn assert_no_leaks(&self) {
        assert_eq!(self.transport.outstanding_contexts(), 0);
        for shard in &self.shards {
            assert_eq!(shard.fetch_tracker().outstanding(), 0);
        }
    }
}

/// One shard with docs 1..=5, query score falling and feature value 0.1×id.
fn rising_feature_shard() -> InMemoryShard {
    (1..=5u32).fold(InMemoryShard::new(), |shard, id| {
        shard
            .with_candidates(vec![(id, 1.0 - 0.1 * id as f32)])
            .with_document(id, "rank", FeatureValue::Float(0.1 * id as f64))
    })
}

fn strategy(config: StrategyConfig, services: &StrategyServices) -> Arc<dyn RankingStrategy> {
    StrategyRegistry::with_defaults().build(config, services).unwrap()
}

fn field_score() -> Arc<dyn RankingStrategy> {
    strategy(
        StrategyConfig::new("field_score")
            .with_field("rank")
            .with_window_size(10),
        &StrategyServices::new(),
    )
}

fn assert_scores(response: &SearchResponse, expected: &[f32]) {
    let scores: Vec<f32> = response.hits.iter().map(|hit| hit.score).collect();
    assert_eq!(scores.len(), expected.len());
    for (actual, expected) in scores.iter().zip(expected) {
        assert!((actual - expected).abs() < 1e-6, "{scores:?} != {expected:?}");
    }
}

#[tokio::test]
async fn rerank_by_field_orders_full_window() {
    let cluster = Cluster::new(vec![rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());

    let response = orchestrator
        .execute(PipelineRequest::new(field_score(), 10), &RankedHitsFetch)
        .await
        .unwrap();

    assert_eq!(response.doc_ids(), vec![5, 4, 3, 2, 1]);
    assert_eq!(response.ranks(), vec![1, 2, 3, 4, 5]);
    assert_scores(&response, &[0.5, 0.4, 0.3, 0.2, 0.1]);
    assert!(!response.is_partial());
    cluster.assert_no_leaks();
}

#[tokio::test]
async fn rerank_page_keeps_absolute_ranks() {
    let cluster = Cluster::new(vec![rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());

    let response = orchestrator
        .execute(
            PipelineRequest::new(field_score(), 2).with_from(2),
            &RankedHitsFetch,
        )
        .await
        .unwrap();

    assert_eq!(response.doc_ids(), vec![3, 2]);
    assert_eq!(response.ranks(), vec![3, 4]);
    cluster.assert_no_leaks();
}

#[tokio::test]
async fn page_past_the_window_is_empty() {
    let cluster = Cluster::new(vec![rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());

    let response = orchestrator
        .execute(
            PipelineRequest::new(field_score(), 2).with_from(10),
            &RankedHitsFetch,
        )
        .await
        .unwrap();

    assert!(response.hits.is_empty());
    assert_eq!(response.total_hits, 5);
    cluster.assert_no_leaks();
}

#[tokio::test]
async fn document_without_rank_field_scores_zero() {
    let cluster = Cluster::new(vec![
        InMemoryShard::new()
            .with_candidates(vec![(1, 0.9), (2, 0.8), (3, 0.7)])
            .with_document(1, "rank", FeatureValue::Float(0.2))
            .with_document(2, "title", FeatureValue::from("no rank stored"))
            .with_document(3, "rank", FeatureValue::Float(0.5)),
    ]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());

    let response = orchestrator
        .execute(PipelineRequest::new(field_score(), 10), &RankedHitsFetch)
        .await
        .unwrap();

    assert_eq!(response.doc_ids(), vec![3, 1, 2]);
    assert_scores(&response, &[0.5, 0.2, 0.0]);
    assert!(!response.is_partial());
    cluster.assert_no_leaks();
}

#[derive(Debug)]
struct UnavailableScorer;

#[async_trait]
impl ExternalScorer for UnavailableScorer {
    async fn score(&self, _request: ScoringRequest) -> Result<Vec<f32>> {
        Err(RankError::other("inference endpoint unavailable"))
    }
}

#[tokio::test]
async fn external_scoring_failure_fails_request() {
    let cluster = Cluster::new(vec![rising_feature_shard(), rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let services = StrategyServices::new().with_scorer("remote", Arc::new(UnavailableScorer));
    let strategy = strategy(
        StrategyConfig::new("external_score")
            .with_field("rank")
            .with_inference_id("remote"),
        &services,
    );

    let err = orchestrator
        .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
        .await
        .unwrap_err();

    assert!(matches!(err, RankError::Coordination(_)), "{err:?}");
    cluster.assert_no_leaks();
    assert_eq!(orchestrator.metrics().snapshot().failed_requests, 1);
}

#[tokio::test]
async fn external_scoring_reranks_across_shards() {
    let cluster = Cluster::new(vec![
        InMemoryShard::new()
            .with_candidates(vec![(1, 0.9), (2, 0.8)])
            .with_document(1, "rating", FeatureValue::from("0.1"))
            .with_document(2, "rating", FeatureValue::from("0.7")),
        InMemoryShard::new()
            .with_candidates(vec![(1, 0.95)])
            .with_document(1, "rating", FeatureValue::from("0.4")),
    ]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let services = StrategyServices::new().with_scorer("numeric", Arc::new(NumericTextScorer));
    let strategy = strategy(
        StrategyConfig::new("external_score")
            .with_field("rating")
            .with_inference_id("numeric")
            .with_inference_text("best rated"),
        &services,
    );

    let response = orchestrator
        .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
        .await
        .unwrap();

    let keys: Vec<(usize, u32)> = response
        .hits
        .iter()
        .map(|hit| (hit.shard_index, hit.doc_id))
        .collect();
    assert_eq!(keys, vec![(0, 2), (1, 1), (0, 1)]);
    assert_scores(&response, &[0.7, 0.4, 0.1]);
    cluster.assert_no_leaks();
}

#[tokio::test]
async fn field_sum_adds_fields_and_query_score() {
    let cluster = Cluster::new(vec![
        InMemoryShard::new()
            .with_candidates(vec![(1, 0.5), (2, 0.1)])
            .with_document(1, "a", FeatureValue::Integer(1))
            .with_document(1, "b", FeatureValue::Float(0.25))
            .with_document(2, "a", FeatureValue::Integer(2)),
    ]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let strategy = strategy(
        StrategyConfig::new("field_sum")
            .with_fields(["a", "b"])
            .with_query_score(true),
        &StrategyServices::new(),
    );

    let response = orchestrator
        .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
        .await
        .unwrap();

    assert_eq!(response.doc_ids(), vec![2, 1]);
    assert_scores(&response, &[2.1, 1.75]);
}

#[tokio::test]
async fn min_score_drops_weak_candidates() {
    let cluster = Cluster::new(vec![rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let strategy = strategy(
        StrategyConfig::new("top_window").with_min_score(0.65),
        &StrategyServices::new(),
    );

    let response = orchestrator
        .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
        .await
        .unwrap();

    assert_eq!(response.doc_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn ties_break_by_shard_then_doc() {
    let cluster = Cluster::new(vec![
        InMemoryShard::new().with_candidates(vec![(9, 1.0), (3, 1.0)]),
        InMemoryShard::new().with_candidates(vec![(1, 1.0), (2, f32::NAN)]),
    ]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let strategy = strategy(StrategyConfig::new("top_window"), &StrategyServices::new());

    let response = orchestrator
        .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
        .await
        .unwrap();

    let keys: Vec<(usize, u32)> = response
        .hits
        .iter()
        .map(|hit| (hit.shard_index, hit.doc_id))
        .collect();
    assert_eq!(keys, vec![(0, 3), (0, 9), (1, 1), (1, 2)]);
}

fn delayed_cluster(ids: &[u32], delays: &[u64]) -> Cluster {
    let shards = ids
        .chunks(10)
        .zip(delays)
        .enumerate()
        .map(|(shard_index, (chunk, &delay))| {
            chunk
                .iter()
                .fold(InMemoryShard::new(), |shard, &id| {
                    // Colliding scores across shards exercise the tie-break.
                    let score = (id % 7) as f32 / 7.0;
                    let rank = ((id + shard_index as u32) % 5) as f64;
                    shard
                        .with_candidates(vec![(id, score)])
                        .with_document(id, "rank", FeatureValue::Float(rank))
                })
                .with_query_delay(Duration::from_millis(delay))
        })
        .collect();
    Cluster::new(shards)
}

#[tokio::test]
async fn output_is_independent_of_arrival_order() {
    let mut rng = rand::rng();
    let mut ids: Vec<u32> = (0..40).collect();
    ids.shuffle(&mut rng);

    let baseline = delayed_cluster(&ids, &[0, 0, 0, 0]);
    let expected = baseline
        .orchestrator(PipelineConfig::default())
        .execute(PipelineRequest::new(field_score(), 15), &RankedHitsFetch)
        .await
        .unwrap();
    assert_eq!(expected.hits.len(), 15);

    for _ in 0..5 {
        let delays: Vec<u64> = (0..4).map(|_| rng.random_range(0..15)).collect();
        let cluster = delayed_cluster(&ids, &delays);
        let response = cluster
            .orchestrator(PipelineConfig::default().with_max_concurrent_shard_requests(4))
            .execute(PipelineRequest::new(field_score(), 15), &RankedHitsFetch)
            .await
            .unwrap();

        assert_eq!(response.hits, expected.hits, "delays {delays:?}");
        cluster.assert_no_leaks();
    }
}

#[tokio::test]
async fn cancelled_request_fails_without_leaks() {
    let cluster = Cluster::new(vec![rising_feature_shard(), rising_feature_shard()]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let cancellation = CancellationFlag::new();
    cancellation.cancel();

    let err = orchestrator
        .execute(
            PipelineRequest::new(field_score(), 10).with_cancellation(cancellation),
            &RankedHitsFetch,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    cluster.assert_no_leaks();
    assert_eq!(orchestrator.metrics().snapshot().cancelled_requests, 1);
}

#[tokio::test]
async fn cancellation_mid_query_phase_releases_opened_contexts() {
    let cluster = Cluster::new(vec![
        rising_feature_shard().with_query_delay(Duration::from_millis(100)),
        rising_feature_shard().with_query_delay(Duration::from_millis(100)),
    ]);
    let orchestrator = cluster.orchestrator(PipelineConfig::default());
    let cancellation = CancellationFlag::new();

    let canceller = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancellation.cancel();
        })
    };

    let err = orchestrator
        .execute(
            PipelineRequest::new(field_score(), 10).with_cancellation(cancellation),
            &RankedHitsFetch,
        )
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled(), "{err:?}");
    cluster.assert_no_leaks();
    assert_eq!(orchestrator.metrics().snapshot().cancelled_requests, 1);
}

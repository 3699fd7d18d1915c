//! Coordinator-side rerank and pagination.

use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashSet;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};
use crate::feature_phase::scoring::{ExternalScorer, FeatureScorer, ScoringRequest};
use crate::rank::{FeatureBatch, RankedDocument, cmp_score_desc, sort_total_order};

/// Page requested by the client plus the candidate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub size: usize,
    pub from: usize,
    pub window_size: usize,
}

impl Pagination {
    pub fn new(size: usize, from: usize, window_size: usize) -> Self {
        Self {
            size,
            from,
            window_size,
        }
    }

    /// Number of documents on the page given `available` ranked documents.
    pub fn output_len(&self, available: usize) -> usize {
        available.saturating_sub(self.from).min(self.size)
    }

    /// Slice `[from, from + size)` out of ranked documents and assign ranks
    /// `from + 1 ..= from + len`.
    ///
    /// `from` past the end yields an empty page.
    pub fn paginate(&self, docs: Vec<RankedDocument>) -> Vec<RankedDocument> {
        let len = self.output_len(docs.len());
        docs.into_iter()
            .skip(self.from)
            .take(len)
            .enumerate()
            .map(|(i, mut doc)| {
                doc.rank = Some((self.from + i + 1) as u32);
                doc
            })
            .collect()
    }
}

/// Flatten the successful batches into one deduplicated candidate list.
///
/// Documents without a payload are dropped. The list is returned in query
/// phase order, so a document's position is its original rank.
pub fn extract_feature_docs(batches: Vec<FeatureBatch>, window_size: usize) -> Vec<RankedDocument> {
    let mut docs: Vec<RankedDocument> = batches
        .into_iter()
        .flat_map(|batch| batch.docs)
        .filter(RankedDocument::has_payload)
        .collect();

    sort_total_order(&mut docs);

    let mut seen = AHashSet::with_capacity(docs.len());
    docs.retain(|doc| seen.insert(doc.key()));
    docs.truncate(window_size);
    docs
}

/// Apply final scores and order by score desc, then original rank asc.
fn apply_scores(docs: Vec<RankedDocument>, scores: Vec<f32>) -> Vec<RankedDocument> {
    let mut ranked: Vec<(usize, RankedDocument)> = docs
        .into_iter()
        .zip(scores)
        .enumerate()
        .map(|(original_rank, (mut doc, score))| {
            doc.score = score;
            (original_rank, doc)
        })
        .collect();

    ranked.sort_by(|(rank_a, a), (rank_b, b)| {
        cmp_score_desc(a.score, b.score).then_with(|| rank_a.cmp(rank_b))
    });

    ranked.into_iter().map(|(_, doc)| doc).collect()
}

/// Computes final scores and the final page from the feature batches.
///
/// Implementors only provide [`compute_scores`](Self::compute_scores); the
/// flatten, sort and paginate steps are shared.
#[async_trait]
pub trait RerankCoordinator: Send + Sync + Debug {
    /// Page and window this coordinator was built for.
    fn pagination(&self) -> Pagination;

    /// Compute one final score per document, in input order.
    async fn compute_scores(&self, docs: &[RankedDocument]) -> Result<Vec<f32>>;

    /// Rank the global results from the batches that returned successfully.
    ///
    /// Scores are computed exactly once. Any scoring failure fails the whole
    /// step; no page is built from a partially scored set.
    async fn rank_global_results(&self, batches: Vec<FeatureBatch>) -> Result<Vec<RankedDocument>> {
        let pagination = self.pagination();
        let docs = extract_feature_docs(batches, pagination.window_size);
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self
            .compute_scores(&docs)
            .await
            .map_err(RankError::into_coordination)?;

        if scores.len() != docs.len() {
            return Err(RankError::coordination(format!(
                "scorer returned {} scores for {} documents",
                scores.len(),
                docs.len()
            )));
        }

        let reranked = apply_scores(docs, scores);
        debug!(
            "reranked {} documents, returning page from={} size={}",
            reranked.len(),
            pagination.from,
            pagination.size
        );
        Ok(pagination.paginate(reranked))
    }
}

/// Reranks with a synchronous per-document scorer.
#[derive(Debug, Clone)]
pub struct ScoringRerankCoordinator {
    pagination: Pagination,
    scorer: Arc<dyn FeatureScorer>,
}

impl ScoringRerankCoordinator {
    pub fn new(pagination: Pagination, scorer: Arc<dyn FeatureScorer>) -> Self {
        Self { pagination, scorer }
    }
}

#[async_trait]
impl RerankCoordinator for ScoringRerankCoordinator {
    fn pagination(&self) -> Pagination {
        self.pagination
    }

    async fn compute_scores(&self, docs: &[RankedDocument]) -> Result<Vec<f32>> {
        docs.iter().map(|doc| self.scorer.score(doc)).collect()
    }
}

/// Reranks through one batched call to an external scorer.
#[derive(Debug, Clone)]
pub struct ExternalRerankCoordinator {
    pagination: Pagination,
    scorer: Arc<dyn ExternalScorer>,
    inference_id: String,
    inference_text: Option<String>,
}

impl ExternalRerankCoordinator {
    pub fn new(
        pagination: Pagination,
        scorer: Arc<dyn ExternalScorer>,
        inference_id: String,
        inference_text: Option<String>,
    ) -> Self {
        Self {
            pagination,
            scorer,
            inference_id,
            inference_text,
        }
    }
}

#[async_trait]
impl RerankCoordinator for ExternalRerankCoordinator {
    fn pagination(&self) -> Pagination {
        self.pagination
    }

    async fn compute_scores(&self, docs: &[RankedDocument]) -> Result<Vec<f32>> {
        let request =
            ScoringRequest::from_docs(self.inference_id.clone(), self.inference_text.clone(), docs);
        debug!(
            "sending {} documents to external scorer [{}]",
            request.len(),
            self.inference_id
        );
        self.scorer.score(request).await
    }
}

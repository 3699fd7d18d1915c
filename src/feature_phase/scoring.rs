//! Final score computation for the rerank step.
//!
//! Two flavors exist. A [`FeatureScorer`] is a pure function of one
//! document's payload and runs inline on the coordinator. An
//! [`ExternalScorer`] is a slow collaborator (an inference service, a remote
//! model) that receives every payload of the request in one batch and answers
//! asynchronously with one score per input, or fails the whole batch.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};
use crate::rank::{FeatureValue, RankedDocument};

/// Computes a final score from a document's payload.
pub trait FeatureScorer: Send + Sync + Debug {
    fn score(&self, doc: &RankedDocument) -> Result<f32>;
}

fn payload(doc: &RankedDocument) -> Result<&[FeatureValue]> {
    doc.feature_payload.as_deref().ok_or_else(|| {
        RankError::coordination(format!(
            "document [{}] on shard [{}] has no feature payload",
            doc.doc_id, doc.shard_index
        ))
    })
}

/// Uses the numeric value of the first payload slot as the score.
///
/// A document without the field scores zero; a non-numeric value fails the
/// batch.
#[derive(Debug, Clone, Default)]
pub struct FieldValueScorer;

impl FeatureScorer for FieldValueScorer {
    fn score(&self, doc: &RankedDocument) -> Result<f32> {
        let value = match payload(doc)?.first() {
            None | Some(FeatureValue::Missing) => return Ok(0.0),
            Some(value) => value,
        };
        value.as_f32().ok_or_else(|| {
            RankError::coordination(format!(
                "feature value [{}] of document [{}] on shard [{}] is not numeric",
                value, doc.doc_id, doc.shard_index
            ))
        })
    }
}

/// Sums the numeric payload slots, optionally adding the query phase score.
///
/// Missing slots count as zero; non-numeric values fail the batch.
#[derive(Debug, Clone, Default)]
pub struct FieldSumScorer {
    include_query_score: bool,
}

impl FieldSumScorer {
    pub fn new(include_query_score: bool) -> Self {
        Self {
            include_query_score,
        }
    }
}

impl FeatureScorer for FieldSumScorer {
    fn score(&self, doc: &RankedDocument) -> Result<f32> {
        let mut total = if self.include_query_score {
            doc.score
        } else {
            0.0
        };
        for value in payload(doc)? {
            if value.is_missing() {
                continue;
            }
            total += value.as_f32().ok_or_else(|| {
                RankError::coordination(format!(
                    "feature value [{}] of document [{}] on shard [{}] is not numeric",
                    value, doc.doc_id, doc.shard_index
                ))
            })?;
        }
        Ok(total)
    }
}

/// One batched call to an external scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    /// Identifier of the scoring endpoint or model.
    pub inference_id: String,

    /// Query text the documents are scored against, if any.
    pub inference_text: Option<String>,

    /// One feature text per document, in request order.
    pub features: Vec<String>,
}

impl ScoringRequest {
    /// Build a request from the payloads of `docs`.
    ///
    /// Multi-field payloads are joined with a single space.
    pub fn from_docs(
        inference_id: String,
        inference_text: Option<String>,
        docs: &[RankedDocument],
    ) -> Self {
        let features = docs
            .iter()
            .map(|doc| {
                doc.feature_payload
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(FeatureValue::to_feature_text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        Self {
            inference_id,
            inference_text,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// An asynchronous, batched scoring collaborator.
///
/// Returns exactly one score per feature, or fails the whole batch.
#[async_trait]
pub trait ExternalScorer: Send + Sync + Debug {
    async fn score(&self, request: ScoringRequest) -> Result<Vec<f32>>;
}

/// Scores each feature text by parsing it as a number.
///
/// Useful as a stand-in for a real inference endpoint in demos and tests.
#[derive(Debug, Clone, Default)]
pub struct NumericTextScorer;

#[async_trait]
impl ExternalScorer for NumericTextScorer {
    async fn score(&self, request: ScoringRequest) -> Result<Vec<f32>> {
        request
            .features
            .iter()
            .map(|text| {
                text.trim().parse::<f32>().map_err(|e| {
                    RankError::other(format!("cannot score feature [{text}]: {e}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_id: u32, score: f32, payload: Vec<FeatureValue>) -> RankedDocument {
        RankedDocument::new(doc_id, score, 0).with_payload(payload)
    }

    #[test]
    fn test_field_value_scorer() {
        let scorer = FieldValueScorer;
        assert_eq!(
            scorer
                .score(&doc(1, 9.0, vec![FeatureValue::from("0.3")]))
                .unwrap(),
            0.3
        );
        assert_eq!(
            scorer
                .score(&doc(1, 9.0, vec![FeatureValue::Float(2.5)]))
                .unwrap(),
            2.5
        );
        assert_eq!(
            scorer
                .score(&doc(1, 9.0, vec![FeatureValue::Missing]))
                .unwrap(),
            0.0
        );
        assert!(scorer
            .score(&doc(1, 9.0, vec![FeatureValue::from("abc")]))
            .is_err());
        assert!(scorer.score(&RankedDocument::new(1, 9.0, 0)).is_err());
    }

    #[test]
    fn test_field_sum_scorer() {
        let payload = vec![
            FeatureValue::Integer(2),
            FeatureValue::Missing,
            FeatureValue::from("0.5"),
        ];
        assert_eq!(
            FieldSumScorer::new(false)
                .score(&doc(1, 1.0, payload.clone()))
                .unwrap(),
            2.5
        );
        assert_eq!(
            FieldSumScorer::new(true).score(&doc(1, 1.0, payload)).unwrap(),
            3.5
        );
        assert!(FieldSumScorer::new(false)
            .score(&doc(1, 1.0, vec![FeatureValue::from("abc")]))
            .is_err());
    }

    #[test]
    fn test_scoring_request_from_docs() {
        let docs = vec![
            doc(1, 1.0, vec![FeatureValue::from("first")]),
            doc(2, 1.0, vec![FeatureValue::from("a"), FeatureValue::Integer(3)]),
            doc(3, 1.0, vec![FeatureValue::Missing]),
        ];
        let request = ScoringRequest::from_docs("model".to_string(), None, &docs);
        assert_eq!(request.features, vec!["first", "a 3", ""]);
        assert_eq!(request.len(), 3);
    }

    #[tokio::test]
    async fn test_numeric_text_scorer() {
        let request = ScoringRequest {
            inference_id: "id".to_string(),
            inference_text: Some("query".to_string()),
            features: vec!["0.5".to_string(), " 2 ".to_string()],
        };
        assert_eq!(NumericTextScorer.score(request).await.unwrap(), vec![0.5, 2.0]);

        let bad = ScoringRequest {
            inference_id: "id".to_string(),
            inference_text: None,
            features: vec!["not a number".to_string()],
        };
        assert!(NumericTextScorer.score(bad).await.is_err());
    }
}

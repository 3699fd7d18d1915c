//! Feature phase: the optional second round trip.
//!
//! After the query phase merge, shards holding surviving documents are asked
//! for per-document feature data ([`FeatureExtractor`]). The coordinator then
//! computes final scores from those features, either synchronously or through
//! one batched call to an external scorer, and paginates the reranked set
//! ([`RerankCoordinator`]).

pub mod extractor;
pub mod rerank;
pub mod scoring;
pub mod source;

pub use extractor::{FeatureExtractor, FieldExtractor};
pub use rerank::{
    ExternalRerankCoordinator, Pagination, RerankCoordinator, ScoringRerankCoordinator,
};
pub use scoring::{
    ExternalScorer, FeatureScorer, FieldSumScorer, FieldValueScorer, NumericTextScorer,
    ScoringRequest,
};
pub use source::{DocumentSource, FetchedFields, FetchedHit};

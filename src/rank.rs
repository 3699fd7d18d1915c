//! Core data carriers of the ranking pipeline.
//!
//! A [`RankedDocument`] is created during shard combine, optionally gains a
//! feature payload during feature extraction, and receives its final score and
//! rank during rerank. Its identity is the [`RankKey`] pair of shard-local doc
//! id and shard index.

pub mod document;
pub mod feature;
pub mod ordering;

pub use document::{FeatureBatch, GlobalResultSet, RankKey, RankedDocument, ShardResultSet};
pub use feature::FeatureValue;
pub use ordering::{cmp_score_desc, cmp_total_order, sort_total_order};

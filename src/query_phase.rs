//! Query phase: shard-local combination and coordinator-side merge.
//!
//! Each shard combines the candidate lists produced by its candidate
//! generators into one bounded [`ShardResultSet`](crate::rank::ShardResultSet).
//! The coordinator then merges the per-shard sets into one bounded
//! [`GlobalResultSet`](crate::rank::GlobalResultSet).

pub mod combiner;
pub mod merger;

pub use combiner::{CandidateList, MaxScoreCombiner, ShardCombiner};
pub use merger::{CoordinatorMerger, TopDocsStats, TopWindowMerger};

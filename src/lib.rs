//! # Rankwise
//!
//! A pluggable, multi-round ranking pipeline for sharded search.
//!
//! ## Features
//!
//! - Query phase: each shard combines its candidate lists into a bounded window
//! - Coordinator merge with a deterministic total order across shards
//! - Optional feature phase that pulls stored fields for the global window
//! - Rerank through local scorers or a batched external scorer
//! - Strategies described by serializable configs and built through a registry
//! - Partial results with per-shard failure reporting

pub mod cli;
pub mod error;
pub mod feature_phase;
pub mod pipeline;
pub mod query_phase;
pub mod rank;
pub mod shard;
pub mod strategy;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

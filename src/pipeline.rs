//! Request orchestration across shards.
//!
//! The [`PipelineOrchestrator`] drives one ranking request through the query
//! phase fan-out, the coordinator merge, the optional feature phase and
//! rerank, and finally hands the ranked page to a [`FetchPhase`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rankwise::pipeline::{PipelineConfig, PipelineOrchestrator, PipelineRequest, RankedHitsFetch};
//! use rankwise::shard::{InMemoryShard, LocalTransport, ShardService};
//! use rankwise::strategy::{StrategyConfig, StrategyRegistry, StrategyServices};
//!
//! # #[tokio::main]
//! # async fn main() -> rankwise::error::Result<()> {
//! let shard = InMemoryShard::new().with_candidates(vec![(1, 0.4), (2, 0.9)]);
//! let transport = Arc::new(LocalTransport::new(vec![Arc::new(ShardService::new(
//!     0,
//!     Arc::new(shard),
//! ))]));
//!
//! let strategy = StrategyRegistry::with_defaults()
//!     .build(StrategyConfig::new("top_window"), &StrategyServices::new())?;
//! let orchestrator = PipelineOrchestrator::new(PipelineConfig::default(), transport);
//!
//! let response = orchestrator
//!     .execute(PipelineRequest::new(strategy, 10), &RankedHitsFetch)
//!     .await?;
//! assert_eq!(response.doc_ids(), vec![2, 1]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod fetch;
pub mod metrics;
pub mod orchestrator;
pub mod request;

pub use config::PipelineConfig;
pub use context::{RequestContext, ResponseSlots, ShardContextGuard, ShardContexts};
pub use fetch::{FetchPhase, RankedHitsFetch, RankedResults, SearchResponse};
pub use metrics::{PipelineMetrics, PipelineMetricsCollector, RequestOutcome};
pub use orchestrator::PipelineOrchestrator;
pub use request::{CancellationFlag, PipelineRequest};

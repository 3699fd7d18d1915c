//! Per-request inputs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{RankError, Result};
use crate::strategy::RankingStrategy;

/// Cooperative cancellation shared by the coordinator and every shard task
/// of one request.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`RankError::Cancelled`] if cancellation was requested.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(RankError::cancelled(format!("request cancelled before {stage}")));
        }
        Ok(())
    }
}

/// One ranking request as seen by the orchestrator.
#[derive(Clone)]
pub struct PipelineRequest {
    /// Number of hits on the returned page.
    pub size: usize,

    /// Offset of the page within the ranked results.
    pub from: usize,

    /// Strategy driving every round of the request.
    pub strategy: Arc<dyn RankingStrategy>,

    /// Cancellation shared with the shard tasks.
    pub cancellation: CancellationFlag,

    /// Overrides the pipeline's partial results policy.
    pub allow_partial_results: Option<bool>,
}

impl PipelineRequest {
    /// Create a request for the first `size` hits.
    pub fn new(strategy: Arc<dyn RankingStrategy>, size: usize) -> Self {
        Self {
            size,
            from: 0,
            strategy,
            cancellation: CancellationFlag::new(),
            allow_partial_results: None,
        }
    }

    /// Set the page offset.
    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Override the partial results policy for this request.
    pub fn with_allow_partial_results(mut self, allow: bool) -> Self {
        self.allow_partial_results = Some(allow);
        self
    }

    /// Window size of the strategy.
    pub fn window_size(&self) -> usize {
        self.strategy.window_size()
    }
}

impl fmt::Debug for PipelineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRequest")
            .field("size", &self.size)
            .field("from", &self.from)
            .field("strategy", &self.strategy.name())
            .field("window_size", &self.window_size())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("allow_partial_results", &self.allow_partial_results)
            .finish()
    }
}

//! Per-request strategy lifecycle.

use std::fmt;

use crate::error::{RankError, Result};

/// How far a strategy instance has progressed within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrategyPhase {
    Created,
    QueryPhaseBuilt,
    FeaturePhaseBuilt,
    Finished,
}

impl fmt::Display for StrategyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyPhase::Created => "created",
            StrategyPhase::QueryPhaseBuilt => "query_phase_built",
            StrategyPhase::FeaturePhaseBuilt => "feature_phase_built",
            StrategyPhase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Tracks a strategy's phase for one request.
///
/// Phases only move forward. Skipping the feature phase is allowed for
/// strategies without an extractor; going back or repeating a phase is not.
#[derive(Debug, Clone)]
pub struct StrategyLifecycle {
    phase: StrategyPhase,
}

impl Default for StrategyLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyLifecycle {
    pub fn new() -> Self {
        Self {
            phase: StrategyPhase::Created,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> StrategyPhase {
        self.phase
    }

    /// Move to `next`.
    pub fn advance(&mut self, next: StrategyPhase) -> Result<()> {
        if next <= self.phase {
            return Err(RankError::invalid_operation(format!(
                "strategy cannot move from [{}] to [{}]",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == StrategyPhase::Finished
    }
}

//! Error types for the rankwise library.
//!
//! All fallible operations return [`RankError`] through the crate-wide
//! [`Result`] alias. The variants follow the failure taxonomy of the ranking
//! pipeline:
//!
//! - [`RankError::Validation`]: a strategy configuration was rejected before
//!   any request was started.
//! - [`RankError::ShardExecution`]: one or more shards failed during combine or
//!   feature extraction and the failure policy made that terminal.
//! - [`RankError::Coordination`]: the coordinator merge, rerank or external
//!   scoring step failed. Always terminal.
//! - [`RankError::Cancelled`]: the owning request was cancelled.
//!
//! # Examples
//!
//! ```
//! use rankwise::error::{RankError, Result};
//!
//! fn parse_window(raw: i64) -> Result<usize> {
//!     if raw <= 0 {
//!         return Err(RankError::validation("window_size must be positive"));
//!     }
//!     Ok(raw as usize)
//! }
//!
//! assert!(parse_window(0).is_err());
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for rankwise operations.
#[derive(Error, Debug)]
pub enum RankError {
    /// Bad strategy configuration, surfaced at parse time.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Shard-level failure promoted to a request failure.
    ///
    /// `suppressed` carries every other captured shard failure.
    #[error("Shard execution error: {message}")]
    ShardExecution {
        shard_index: Option<usize>,
        message: String,
        suppressed: Vec<ShardFailure>,
    },

    /// Failure in coordinator merge, rerank or external scoring.
    #[error("Coordination error: {0}")]
    Coordination(String),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O errors (corpus files, config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with RankError.
pub type Result<T> = std::result::Result<T, RankError>;

impl From<bincode::Error> for RankError {
    fn from(err: bincode::Error) -> Self {
        RankError::Serialization(err.to_string())
    }
}

impl RankError {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        RankError::Validation(msg.into())
    }

    /// Create a new shard execution error for a single shard.
    pub fn shard<S: Into<String>>(shard_index: usize, msg: S) -> Self {
        RankError::ShardExecution {
            shard_index: Some(shard_index),
            message: msg.into(),
            suppressed: Vec::new(),
        }
    }

    /// Create a new coordination error.
    pub fn coordination<S: Into<String>>(msg: S) -> Self {
        RankError::Coordination(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        RankError::Cancelled(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        RankError::InvalidOperation(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        RankError::Timeout(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        RankError::Other(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        RankError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Build the request-level error from captured shard failures.
    ///
    /// The first failure becomes the cause, the rest are attached as
    /// suppressed. Returns `None` if `failures` is empty.
    pub fn from_shard_failures(mut failures: Vec<ShardFailure>) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        let first = failures.remove(0);
        Some(RankError::ShardExecution {
            shard_index: Some(first.shard_index),
            message: format!("[{}] {}", first.phase, first.reason),
            suppressed: failures,
        })
    }

    /// Shard failures attached to this error as suppressed causes.
    pub fn suppressed(&self) -> &[ShardFailure] {
        match self {
            RankError::ShardExecution { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// The error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            RankError::Validation(msg)
            | RankError::Coordination(msg)
            | RankError::Cancelled(msg)
            | RankError::InvalidOperation(msg)
            | RankError::Timeout(msg)
            | RankError::Serialization(msg)
            | RankError::Other(msg) => msg.clone(),
            RankError::ShardExecution { message, .. } => message.clone(),
            RankError::Io(err) => err.to_string(),
            RankError::Json(err) => err.to_string(),
            RankError::Anyhow(err) => err.to_string(),
        }
    }

    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RankError::Cancelled(_))
    }

    /// Wrap any error raised while coordinating into a coordination error.
    ///
    /// Cancellation passes through untouched.
    pub fn into_coordination(self) -> Self {
        match self {
            RankError::Coordination(_) | RankError::Cancelled(_) => self,
            other => RankError::Coordination(other.to_string()),
        }
    }
}

/// The pipeline phase a shard failure was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardPhase {
    /// Query phase: candidate retrieval and shard-local combine.
    Query,
    /// Feature phase: feature extraction for the surviving documents.
    Feature,
}

impl fmt::Display for ShardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardPhase::Query => write!(f, "query"),
            ShardPhase::Feature => write!(f, "feature"),
        }
    }
}

/// A failure reported by one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard_index: usize,
    pub phase: ShardPhase,
    pub reason: String,
}

impl ShardFailure {
    pub fn new<S: Into<String>>(shard_index: usize, phase: ShardPhase, reason: S) -> Self {
        Self {
            shard_index,
            phase,
            reason: reason.into(),
        }
    }

    /// Capture a shard failure from an error.
    pub fn from_error(shard_index: usize, phase: ShardPhase, err: &RankError) -> Self {
        Self::new(shard_index, phase, err.message())
    }
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard [{}] failed in {} phase: {}",
            self.shard_index, self.phase, self.reason
        )
    }
}

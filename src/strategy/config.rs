//! Strategy configuration.

use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};

/// Default number of candidates considered per shard and globally.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

/// Serializable description of a ranking strategy.
///
/// The registry turns a config into a concrete strategy by `name`; the other
/// fields are interpreted by that strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Registered strategy name.
    pub name: String,

    /// Maximum number of candidates kept per shard and after the merge.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Stored fields read during the feature phase, in payload order.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Identifier of the external scorer, for strategies that use one.
    #[serde(default)]
    pub inference_id: Option<String>,

    /// Query text passed to the external scorer.
    #[serde(default)]
    pub inference_text: Option<String>,

    /// Shard candidates scoring below this are dropped during combine.
    #[serde(default)]
    pub min_score: Option<f32>,

    /// Add the query phase score to the feature sum.
    #[serde(default)]
    pub include_query_score: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            window_size: DEFAULT_WINDOW_SIZE,
            fields: Vec::new(),
            inference_id: None,
            inference_text: None,
            min_score: None,
            include_query_score: false,
        }
    }
}

impl StrategyConfig {
    /// Create a config for the named strategy with default settings.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the window size.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Append a feature field.
    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Replace the feature fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the external scorer id.
    pub fn with_inference_id<S: Into<String>>(mut self, inference_id: S) -> Self {
        self.inference_id = Some(inference_id.into());
        self
    }

    /// Set the query text sent to the external scorer.
    pub fn with_inference_text<S: Into<String>>(mut self, inference_text: S) -> Self {
        self.inference_text = Some(inference_text.into());
        self
    }

    /// Set the minimum shard-level score.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Add the query phase score to summed features.
    pub fn with_query_score(mut self, include: bool) -> Self {
        self.include_query_score = include;
        self
    }

    /// Check the settings shared by every strategy.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RankError::validation("strategy name cannot be empty"));
        }
        if self.window_size == 0 {
            return Err(RankError::validation(
                "window_size must be greater than zero",
            ));
        }
        if self.fields.iter().any(|field| field.trim().is_empty()) {
            return Err(RankError::validation("field cannot be null or empty"));
        }
        if let Some(min_score) = self.min_score {
            if !min_score.is_finite() {
                return Err(RankError::validation(format!(
                    "min_score must be finite, got {min_score}"
                )));
            }
        }
        if matches!(&self.inference_id, Some(id) if id.trim().is_empty()) {
            return Err(RankError::validation("inference_id cannot be empty"));
        }
        Ok(())
    }

    /// Decode a config from JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode the config as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode a config from its binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Encode the config in its compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

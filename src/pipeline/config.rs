//! Configuration for the ranking pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether a request may complete when some shards failed.
    pub allow_partial_results: bool,

    /// Maximum number of shard requests in flight per round.
    pub max_concurrent_shard_requests: usize,

    /// Timeout for one shard request.
    pub shard_timeout: Duration,

    /// Whether to collect metrics.
    pub enable_metrics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allow_partial_results: true,
            max_concurrent_shard_requests: num_cpus::get() * 2,
            shard_timeout: Duration::from_secs(30),
            enable_metrics: true,
        }
    }
}

impl PipelineConfig {
    /// Set the partial results policy.
    pub fn with_allow_partial_results(mut self, allow: bool) -> Self {
        self.allow_partial_results = allow;
        self
    }

    /// Set the per-round concurrency limit. Zero is treated as one.
    pub fn with_max_concurrent_shard_requests(mut self, max: usize) -> Self {
        self.max_concurrent_shard_requests = max.max(1);
        self
    }

    /// Set the shard timeout.
    pub fn with_shard_timeout(mut self, timeout: Duration) -> Self {
        self.shard_timeout = timeout;
        self
    }

    /// Set whether to collect metrics.
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.allow_partial_results);
        assert!(config.max_concurrent_shard_requests > 0);
        assert_eq!(config.shard_timeout, Duration::from_secs(30));
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::default()
            .with_allow_partial_results(false)
            .with_max_concurrent_shard_requests(0)
            .with_shard_timeout(Duration::from_millis(250))
            .with_metrics(false);

        assert!(!config.allow_partial_results);
        assert_eq!(config.max_concurrent_shard_requests, 1);
        assert_eq!(config.shard_timeout, Duration::from_millis(250));
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"allow_partial_results": false}"#).unwrap();
        assert!(!config.allow_partial_results);
        assert_eq!(config.shard_timeout, Duration::from_secs(30));
    }
}

//! Metrics collection for ranking requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Snapshot of pipeline metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Total number of requests executed.
    pub total_requests: u64,

    /// Number of successful requests.
    pub successful_requests: u64,

    /// Number of failed requests, cancellations excluded.
    pub failed_requests: u64,

    /// Number of cancelled requests.
    pub cancelled_requests: u64,

    /// Shard failures captured across all requests.
    pub shard_failures: u64,

    /// Documents retained by the query phase merge.
    pub total_docs_retained: u64,

    /// Hits returned to clients.
    pub total_hits_returned: u64,

    /// Total execution time across all requests.
    pub total_execution_time: Duration,

    /// Average execution time per request.
    pub avg_execution_time: Duration,

    /// Maximum execution time observed.
    pub max_execution_time: Duration,

    /// Minimum execution time observed.
    pub min_execution_time: Duration,
}

/// Outcome of one request, as recorded by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
    Cancelled,
}

/// Thread-safe collector for pipeline metrics.
#[derive(Debug)]
pub struct PipelineMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    cancelled_requests: AtomicU64,
    shard_failures: AtomicU64,
    total_docs_retained: AtomicU64,
    total_hits_returned: AtomicU64,
    total_execution_nanos: AtomicU64,
    max_execution_nanos: AtomicU64,
    min_execution_nanos: AtomicU64,
    start_time: Instant,
}

impl PipelineMetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            cancelled_requests: AtomicU64::new(0),
            shard_failures: AtomicU64::new(0),
            total_docs_retained: AtomicU64::new(0),
            total_hits_returned: AtomicU64::new(0),
            total_execution_nanos: AtomicU64::new(0),
            max_execution_nanos: AtomicU64::new(0),
            min_execution_nanos: AtomicU64::new(u64::MAX),
            start_time: Instant::now(),
        }
    }

    /// Record one finished request.
    pub fn record_request(
        &self,
        execution_time: Duration,
        outcome: RequestOutcome,
        shard_failures: u64,
        docs_retained: u64,
        hits_returned: u64,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            RequestOutcome::Success => &self.successful_requests,
            RequestOutcome::Failure => &self.failed_requests,
            RequestOutcome::Cancelled => &self.cancelled_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.shard_failures
            .fetch_add(shard_failures, Ordering::Relaxed);
        self.total_docs_retained
            .fetch_add(docs_retained, Ordering::Relaxed);
        self.total_hits_returned
            .fetch_add(hits_returned, Ordering::Relaxed);

        let nanos = execution_time.as_nanos() as u64;
        self.total_execution_nanos
            .fetch_add(nanos, Ordering::Relaxed);
        self.max_execution_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.min_execution_nanos.fetch_min(nanos, Ordering::Relaxed);
    }

    /// Get the current metrics snapshot.
    pub fn snapshot(&self) -> PipelineMetrics {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_nanos = self.total_execution_nanos.load(Ordering::Relaxed);

        let avg_nanos = if total_requests > 0 {
            total_nanos / total_requests
        } else {
            0
        };

        let min_nanos = self.min_execution_nanos.load(Ordering::Relaxed);
        let min_duration = if min_nanos == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_nanos(min_nanos)
        };

        PipelineMetrics {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            cancelled_requests: self.cancelled_requests.load(Ordering::Relaxed),
            shard_failures: self.shard_failures.load(Ordering::Relaxed),
            total_docs_retained: self.total_docs_retained.load(Ordering::Relaxed),
            total_hits_returned: self.total_hits_returned.load(Ordering::Relaxed),
            total_execution_time: Duration::from_nanos(total_nanos),
            avg_execution_time: Duration::from_nanos(avg_nanos),
            max_execution_time: Duration::from_nanos(
                self.max_execution_nanos.load(Ordering::Relaxed),
            ),
            min_execution_time: min_duration,
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.cancelled_requests.store(0, Ordering::Relaxed);
        self.shard_failures.store(0, Ordering::Relaxed);
        self.total_docs_retained.store(0, Ordering::Relaxed);
        self.total_hits_returned.store(0, Ordering::Relaxed);
        self.total_execution_nanos.store(0, Ordering::Relaxed);
        self.max_execution_nanos.store(0, Ordering::Relaxed);
        self.min_execution_nanos.store(u64::MAX, Ordering::Relaxed);
    }

    /// Get the uptime of this collector.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for PipelineMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

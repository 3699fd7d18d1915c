//! Per-request coordinator state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::trace;
use uuid::Uuid;

use crate::error::{RankError, Result, ShardFailure};
use crate::query_phase::TopDocsStats;
use crate::shard::{ShardContextId, ShardTransport};
use crate::strategy::StrategyLifecycle;

/// One slot per dispatched shard request.
///
/// Responses land in the slot of the shard they answer, so the collected
/// results are ordered by dispatch position regardless of arrival order.
/// The round is complete once every slot is filled.
#[derive(Debug)]
pub struct ResponseSlots<T> {
    slots: Vec<Option<T>>,
    received: usize,
}

impl<T> ResponseSlots<T> {
    /// Create `expected` empty slots.
    pub fn new(expected: usize) -> Self {
        Self {
            slots: (0..expected).map(|_| None).collect(),
            received: 0,
        }
    }

    /// Store the response for `slot`. A slot accepts exactly one response.
    pub fn set(&mut self, slot: usize, value: T) -> Result<()> {
        let entry = self.slots.get_mut(slot).ok_or_else(|| {
            RankError::invalid_operation(format!("response slot [{slot}] out of range"))
        })?;
        if entry.is_some() {
            return Err(RankError::invalid_operation(format!(
                "response slot [{slot}] already filled"
            )));
        }
        *entry = Some(value);
        self.received += 1;
        Ok(())
    }

    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn remaining(&self) -> usize {
        self.expected() - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Filled slots in slot order.
    pub fn into_responses(self) -> Vec<T> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Keeps one shard context open until released or dropped.
pub struct ShardContextGuard {
    transport: Arc<dyn ShardTransport>,
    shard_index: usize,
    context_id: ShardContextId,
    released: bool,
}

impl ShardContextGuard {
    pub fn new(
        transport: Arc<dyn ShardTransport>,
        shard_index: usize,
        context_id: ShardContextId,
    ) -> Self {
        Self {
            transport,
            shard_index,
            context_id,
            released: false,
        }
    }

    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    pub fn context_id(&self) -> ShardContextId {
        self.context_id
    }

    /// Release the context. Returns `false` if this guard already did.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        trace!(
            "releasing context [{}] on shard [{}]",
            self.context_id, self.shard_index
        );
        self.transport
            .release_context(self.shard_index, self.context_id);
        true
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ShardContextGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ShardContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardContextGuard")
            .field("shard_index", &self.shard_index)
            .field("context_id", &self.context_id)
            .field("released", &self.released)
            .finish()
    }
}

/// Open shard contexts of one request, keyed by shard index.
#[derive(Debug, Default)]
pub struct ShardContexts {
    guards: BTreeMap<usize, ShardContextGuard>,
}

impl ShardContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a context; a previous guard for the same shard is released.
    pub fn insert(&mut self, guard: ShardContextGuard) {
        self.guards.insert(guard.shard_index(), guard);
    }

    pub fn context_id(&self, shard_index: usize) -> Option<ShardContextId> {
        self.guards.get(&shard_index).map(ShardContextGuard::context_id)
    }

    /// Release the context of one shard.
    pub fn release(&mut self, shard_index: usize) -> bool {
        match self.guards.remove(&shard_index) {
            Some(mut guard) => guard.release(),
            None => false,
        }
    }

    /// Release every context whose shard is not in `keep`.
    ///
    /// Returns the number of contexts released.
    pub fn retain_shards(&mut self, keep: &BTreeSet<usize>) -> usize {
        let unused: Vec<usize> = self
            .guards
            .keys()
            .filter(|shard| !keep.contains(shard))
            .copied()
            .collect();
        unused
            .into_iter()
            .filter(|shard| self.release(*shard))
            .count()
    }

    /// Release every context.
    pub fn release_all(&mut self) -> usize {
        self.retain_shards(&BTreeSet::new())
    }

    /// Shards with an open context, ascending.
    pub fn shard_indices(&self) -> Vec<usize> {
        self.guards.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// State the orchestrator owns for one request.
///
/// Dropping it releases every shard context still open, which covers
/// failure and cancellation paths.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub lifecycle: StrategyLifecycle,
    pub contexts: ShardContexts,
    pub failures: Vec<ShardFailure>,
    pub stats: TopDocsStats,
    pub total_shards: usize,
    started: Instant,
}

impl RequestContext {
    pub fn new(total_shards: usize) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            lifecycle: StrategyLifecycle::new(),
            contexts: ShardContexts::new(),
            failures: Vec::new(),
            stats: TopDocsStats::default(),
            total_shards,
            started: Instant::now(),
        }
    }

    /// Capture a shard failure.
    pub fn record_failure(&mut self, failure: ShardFailure) {
        self.failures.push(failure);
    }

    /// Time since the request started.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

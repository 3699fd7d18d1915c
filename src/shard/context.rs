//! Shard search contexts kept alive between rounds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use log::trace;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::rank::RankedDocument;
use crate::util::{ResourceTracker, TrackedResource};

/// Opaque handle to a shard's retained query phase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardContextId(pub u64);

impl fmt::Display for ShardContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// The query phase result a shard keeps for the following rounds.
#[derive(Debug)]
pub struct ShardSearchContext {
    pub id: ShardContextId,
    pub docs: Vec<RankedDocument>,
    _resource: TrackedResource,
}

/// Open search contexts of one shard.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    next_id: AtomicU64,
    contexts: Mutex<AHashMap<ShardContextId, ShardSearchContext>>,
    tracker: ResourceTracker,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain `docs` and return the handle to them.
    pub fn open(&self, docs: Vec<RankedDocument>) -> ShardContextId {
        let id = ShardContextId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let context = ShardSearchContext {
            id,
            docs,
            _resource: self.tracker.acquire(),
        };
        self.contexts.lock().insert(id, context);
        trace!("opened search context [{id}]");
        id
    }

    /// Look up the retained documents with the given doc ids.
    ///
    /// Returns `None` if the context is unknown or was already released.
    /// Doc ids the context does not hold are skipped.
    pub fn docs(&self, id: ShardContextId, doc_ids: &[u32]) -> Option<Vec<RankedDocument>> {
        let contexts = self.contexts.lock();
        let context = contexts.get(&id)?;
        Some(
            context
                .docs
                .iter()
                .filter(|doc| doc_ids.contains(&doc.doc_id))
                .cloned()
                .collect(),
        )
    }

    /// Release a context. Returns `false` if it was not open.
    pub fn release(&self, id: ShardContextId) -> bool {
        let released = self.contexts.lock().remove(&id).is_some();
        if released {
            trace!("released search context [{id}]");
        }
        released
    }

    /// Number of open contexts.
    pub fn outstanding(&self) -> u64 {
        self.tracker.outstanding()
    }

    /// Accounting for every context this registry opened.
    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }
}

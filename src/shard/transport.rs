//! Coordinator to shard transport.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{RankError, Result};
use crate::rank::FeatureBatch;
use crate::shard::context::ShardContextId;
use crate::shard::request::{ShardFeatureRequest, ShardQueryRequest, ShardQueryResult};
use crate::shard::service::ShardService;

/// Delivers shard requests and their responses.
#[async_trait]
pub trait ShardTransport: Send + Sync {
    /// Number of shards reachable through this transport.
    fn shard_count(&self) -> usize;

    async fn execute_query_phase(&self, request: ShardQueryRequest) -> Result<ShardQueryResult>;

    async fn execute_feature_phase(&self, request: ShardFeatureRequest) -> Result<FeatureBatch>;

    /// Release a shard's retained context. Returns `false` if it was not open.
    ///
    /// Must not block; it is called from guard destructors.
    fn release_context(&self, shard_index: usize, context_id: ShardContextId) -> bool;
}

/// In-process transport running shard work on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    shards: Vec<Arc<ShardService>>,
}

impl LocalTransport {
    pub fn new(shards: Vec<Arc<ShardService>>) -> Self {
        Self { shards }
    }

    /// Shard services by index.
    pub fn shards(&self) -> &[Arc<ShardService>] {
        &self.shards
    }

    /// Open contexts across all shards.
    pub fn outstanding_contexts(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.contexts().outstanding())
            .sum()
    }

    fn shard(&self, shard_index: usize) -> Result<Arc<ShardService>> {
        self.shards.get(shard_index).cloned().ok_or_else(|| {
            RankError::shard(shard_index, format!("no such shard [{shard_index}]"))
        })
    }
}

fn join_error(shard_index: usize, err: tokio::task::JoinError) -> RankError {
    if err.is_panic() {
        RankError::shard(shard_index, "shard task panicked")
    } else {
        RankError::shard(shard_index, format!("shard task failed: {err}"))
    }
}

/// A query phase running on the blocking pool.
///
/// If the caller stops waiting (timeout, dropped request), the context the
/// task opens is released once the task finishes.
struct PendingQuery {
    shard_index: usize,
    service: Arc<ShardService>,
    handle: Option<JoinHandle<Result<ShardQueryResult>>>,
}

impl PendingQuery {
    async fn wait(mut self) -> Result<ShardQueryResult> {
        let joined = match self.handle.as_mut() {
            Some(handle) => handle.await,
            None => return Err(RankError::internal("query task already awaited")),
        };
        self.handle = None;
        joined.map_err(|err| join_error(self.shard_index, err))?
    }
}

impl Drop for PendingQuery {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let service = Arc::clone(&self.service);
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Ok(Ok(result)) = handle.await {
                        debug!(
                            "releasing abandoned context [{}] on shard [{}]",
                            result.context_id, result.shard_index
                        );
                        service.release_context(result.context_id);
                    }
                });
            }
            Err(_) => warn!(
                "query task on shard [{}] abandoned outside a runtime",
                self.shard_index
            ),
        }
    }
}

#[async_trait]
impl ShardTransport for LocalTransport {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    async fn execute_query_phase(&self, request: ShardQueryRequest) -> Result<ShardQueryResult> {
        let shard_index = request.shard_index;
        let service = self.shard(shard_index)?;
        let task_service = Arc::clone(&service);
        let pending = PendingQuery {
            shard_index,
            service,
            handle: Some(tokio::task::spawn_blocking(move || {
                task_service.execute_query_phase(&request)
            })),
        };
        pending.wait().await
    }

    async fn execute_feature_phase(&self, request: ShardFeatureRequest) -> Result<FeatureBatch> {
        let shard_index = request.shard_index;
        let service = self.shard(shard_index)?;
        tokio::task::spawn_blocking(move || service.execute_feature_phase(&request))
            .await
            .map_err(|err| join_error(shard_index, err))?
    }

    fn release_context(&self, shard_index: usize, context_id: ShardContextId) -> bool {
        match self.shards.get(shard_index) {
            Some(shard) => shard.release_context(context_id),
            None => false,
        }
    }
}

impl fmt::Display for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local transport over {} shards", self.shards.len())
    }
}

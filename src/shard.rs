//! Shard side of the ranking protocol.
//!
//! A [`ShardService`] answers the two shard rounds: the query phase combines
//! the shard's candidate lists and retains the result in a search context,
//! the feature phase reads payloads for the documents that survived the
//! coordinator merge. A [`ShardTransport`] carries the requests; the
//! in-process [`LocalTransport`] runs each shard call on the blocking pool.

pub mod context;
pub mod memory;
pub mod request;
pub mod searcher;
pub mod service;
pub mod transport;

pub use context::{ContextRegistry, ShardContextId, ShardSearchContext};
pub use memory::{CorpusDefinition, InMemoryShard, ShardDefinition, StoredDocument};
pub use request::{ShardFeatureRequest, ShardQueryRequest, ShardQueryResult};
pub use searcher::{CandidateLists, ShardSearcher};
pub use service::ShardService;
pub use transport::{LocalTransport, ShardTransport};

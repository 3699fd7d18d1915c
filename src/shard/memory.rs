//! In-memory shard for tests, demos and the CLI.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};
use crate::feature_phase::{DocumentSource, FetchedFields, FetchedHit};
use crate::query_phase::CandidateList;
use crate::rank::FeatureValue;
use crate::shard::searcher::{CandidateLists, ShardSearcher};
use crate::util::ResourceTracker;

/// A shard held entirely in memory.
///
/// Candidate lists are fixed at construction; every query phase returns
/// them as is. Failures and delays can be injected to exercise the
/// pipeline's failure handling.
#[derive(Debug, Default)]
pub struct InMemoryShard {
    documents: HashMap<u32, HashMap<String, FeatureValue>>,
    candidates: Vec<CandidateList>,
    total_hits: Option<u64>,
    candidate_failure: Option<String>,
    fetch_failure: Option<String>,
    query_delay: Option<Duration>,
    fetches: ResourceTracker,
}

impl InMemoryShard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a field value for a document.
    pub fn with_document<S: Into<String>>(
        mut self,
        doc_id: u32,
        field: S,
        value: FeatureValue,
    ) -> Self {
        self.documents
            .entry(doc_id)
            .or_default()
            .insert(field.into(), value);
        self
    }

    /// Add one candidate list.
    pub fn with_candidates(mut self, list: CandidateList) -> Self {
        self.candidates.push(list);
        self
    }

    /// Report a fixed hit count instead of the number of distinct candidates.
    pub fn with_total_hits(mut self, total_hits: u64) -> Self {
        self.total_hits = Some(total_hits);
        self
    }

    /// Fail every query phase with `reason`.
    pub fn with_candidate_failure<S: Into<String>>(mut self, reason: S) -> Self {
        self.candidate_failure = Some(reason.into());
        self
    }

    /// Fail every stored field read with `reason`.
    pub fn with_fetch_failure<S: Into<String>>(mut self, reason: S) -> Self {
        self.fetch_failure = Some(reason.into());
        self
    }

    /// Block each query phase for `delay`.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Accounting for intermediate fetch results.
    pub fn fetch_tracker(&self) -> &ResourceTracker {
        &self.fetches
    }

    fn distinct_candidates(&self) -> u64 {
        let ids: AHashSet<u32> = self
            .candidates
            .iter()
            .flat_map(|list| list.iter().map(|(doc_id, _)| *doc_id))
            .collect();
        ids.len() as u64
    }
}

impl DocumentSource for InMemoryShard {
    fn fetch_fields(&self, doc_ids: &[u32], fields: &[String]) -> Result<FetchedFields> {
        let guard = self.fetches.acquire();
        if let Some(reason) = &self.fetch_failure {
            return Err(RankError::other(reason.clone()));
        }

        let hits = doc_ids
            .iter()
            .filter_map(|doc_id| {
                let stored = self.documents.get(doc_id)?;
                let hit = fields.iter().fold(FetchedHit::new(*doc_id), |hit, field| {
                    match stored.get(field) {
                        Some(value) if !value.is_missing() => hit.with_value(field.clone(), value.clone()),
                        _ => hit,
                    }
                });
                Some(hit)
            })
            .collect();

        Ok(FetchedFields::new(hits, guard))
    }
}

impl ShardSearcher for InMemoryShard {
    fn candidate_lists(&self) -> Result<CandidateLists> {
        if let Some(delay) = self.query_delay {
            std::thread::sleep(delay);
        }
        if let Some(reason) = &self.candidate_failure {
            return Err(RankError::other(reason.clone()));
        }
        Ok(CandidateLists {
            lists: self.candidates.clone(),
            total_hits: self
                .total_hits
                .unwrap_or_else(|| self.distinct_candidates()),
        })
    }
}

/// Stored fields of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub doc_id: u32,
    #[serde(default)]
    pub fields: HashMap<String, FeatureValue>,
}

/// Serializable description of one in-memory shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardDefinition {
    #[serde(default)]
    pub documents: Vec<StoredDocument>,
    #[serde(default)]
    pub candidates: Vec<CandidateList>,
    #[serde(default)]
    pub total_hits: Option<u64>,
    #[serde(default)]
    pub fail_candidates: Option<String>,
    #[serde(default)]
    pub fail_fetch: Option<String>,
}

impl From<ShardDefinition> for InMemoryShard {
    fn from(definition: ShardDefinition) -> Self {
        let mut shard = InMemoryShard::new();
        for document in definition.documents {
            let stored = shard.documents.entry(document.doc_id).or_default();
            stored.extend(document.fields);
        }
        shard.candidates = definition.candidates;
        shard.total_hits = definition.total_hits;
        shard.candidate_failure = definition.fail_candidates;
        shard.fetch_failure = definition.fail_fetch;
        shard
    }
}

/// A set of shards, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusDefinition {
    pub shards: Vec<ShardDefinition>,
}

impl CorpusDefinition {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read a corpus file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_json(&bytes)
    }

    /// Build one in-memory shard per definition, in order.
    pub fn into_shards(self) -> Vec<InMemoryShard> {
        self.shards.into_iter().map(InMemoryShard::from).collect()
    }
}

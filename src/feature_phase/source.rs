//! Stored field access used by feature extraction.

use std::collections::HashMap;

use crate::error::Result;
use crate::rank::FeatureValue;
use crate::util::TrackedResource;

/// Stored values of one document, keyed by field name.
///
/// A field maps to every value stored for it; an absent key or an empty list
/// means the document does not have the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedHit {
    pub doc_id: u32,
    pub fields: HashMap<String, Vec<FeatureValue>>,
}

impl FetchedHit {
    pub fn new(doc_id: u32) -> Self {
        Self {
            doc_id,
            fields: HashMap::new(),
        }
    }

    /// Add a value for a field.
    pub fn with_value<S: Into<String>>(mut self, field: S, value: FeatureValue) -> Self {
        self.fields.entry(field.into()).or_default().push(value);
        self
    }

    /// Collapse the stored values of `field` into one payload slot.
    ///
    /// No value gives [`FeatureValue::Missing`], one value is returned as is,
    /// several values become a [`FeatureValue::List`].
    pub fn feature(&self, field: &str) -> FeatureValue {
        match self.fields.get(field).map(|v| v.as_slice()) {
            None | Some([]) => FeatureValue::Missing,
            Some([single]) => single.clone(),
            Some(values) => FeatureValue::List(values.to_vec()),
        }
    }
}

/// Intermediate fetch result read from a shard.
///
/// Holds one reference on the shard's fetch-result pool, given back exactly
/// once when this value is dropped.
#[derive(Debug)]
pub struct FetchedFields {
    hits: Vec<FetchedHit>,
    _guard: TrackedResource,
}

impl FetchedFields {
    /// Wrap fetched hits together with the reference they were read under.
    pub fn new(hits: Vec<FetchedHit>, guard: TrackedResource) -> Self {
        Self {
            hits,
            _guard: guard,
        }
    }

    /// Fetched hits in the order they were requested.
    pub fn hits(&self) -> &[FetchedHit] {
        &self.hits
    }

    /// Find the hit for a doc id.
    pub fn get(&self, doc_id: u32) -> Option<&FetchedHit> {
        self.hits.iter().find(|hit| hit.doc_id == doc_id)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Read access to the stored fields of one shard.
pub trait DocumentSource: Send + Sync {
    /// Load `fields` for `doc_ids`, which are sorted ascending.
    fn fetch_fields(&self, doc_ids: &[u32], fields: &[String]) -> Result<FetchedFields>;
}

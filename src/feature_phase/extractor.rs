//! Shard-local feature extraction.

use std::fmt::Debug;

use log::{trace, warn};

use crate::error::{RankError, Result};
use crate::feature_phase::source::DocumentSource;
use crate::rank::{FeatureBatch, RankedDocument};

/// Attaches feature payloads to the documents a shard was asked about.
pub trait FeatureExtractor: Send + Sync + Debug {
    /// Field names read into the payload, in payload order.
    fn fields(&self) -> &[String];

    /// Read the payloads of `docs` from `source`.
    ///
    /// Either every document gets its payload or the whole batch fails; a
    /// partially filled batch is never returned.
    fn extract(
        &self,
        shard_index: usize,
        docs: Vec<RankedDocument>,
        source: &dyn DocumentSource,
    ) -> Result<FeatureBatch>;
}

/// Reads a fixed list of stored fields.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    fields: Vec<String>,
}

impl FieldExtractor {
    /// Create a new extractor reading `fields`.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Create a new extractor reading a single field.
    pub fn single<S: Into<String>>(field: S) -> Self {
        Self::new(vec![field.into()])
    }

    fn read_payloads(
        &self,
        shard_index: usize,
        mut docs: Vec<RankedDocument>,
        source: &dyn DocumentSource,
    ) -> Result<Vec<RankedDocument>> {
        docs.sort_by_key(|doc| doc.doc_id);
        let doc_ids: Vec<u32> = docs.iter().map(|doc| doc.doc_id).collect();

        let fetched = source.fetch_fields(&doc_ids, &self.fields)?;

        for doc in docs.iter_mut() {
            let hit = fetched.get(doc.doc_id).ok_or_else(|| {
                RankError::shard(
                    shard_index,
                    format!("document [{}] missing from fetch result", doc.doc_id),
                )
            })?;
            let payload = self.fields.iter().map(|field| hit.feature(field)).collect();
            doc.feature_payload = Some(payload);
        }

        Ok(docs)
    }
}

impl FeatureExtractor for FieldExtractor {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn extract(
        &self,
        shard_index: usize,
        docs: Vec<RankedDocument>,
        source: &dyn DocumentSource,
    ) -> Result<FeatureBatch> {
        if docs.is_empty() {
            return Ok(FeatureBatch::empty(shard_index));
        }

        let doc_count = docs.len();
        match self.read_payloads(shard_index, docs, source) {
            Ok(docs) => {
                trace!(
                    "extracted {} payloads for fields {:?} on shard [{}]",
                    doc_count, self.fields, shard_index
                );
                Ok(FeatureBatch::new(shard_index, docs))
            }
            Err(err) => {
                warn!(
                    "error while fetching feature data for fields {:?} on shard [{}] ({} docs): {}",
                    self.fields, shard_index, doc_count, err
                );
                Err(match err {
                    RankError::ShardExecution { .. } | RankError::Cancelled(_) => err,
                    other => RankError::shard(shard_index, other.message()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_phase::source::{FetchedFields, FetchedHit};
    use crate::rank::FeatureValue;
    use crate::util::ResourceTracker;
    use parking_lot::Mutex;

    struct TestSource {
        tracker: ResourceTracker,
        hits: Vec<FetchedHit>,
        fail: bool,
        requested: Mutex<Vec<Vec<u32>>>,
    }

    impl TestSource {
        fn new(hits: Vec<FetchedHit>) -> Self {
            Self {
                tracker: ResourceTracker::new(),
                hits,
                fail: false,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl DocumentSource for TestSource {
        fn fetch_fields(&self, doc_ids: &[u32], _fields: &[String]) -> Result<FetchedFields> {
            self.requested.lock().push(doc_ids.to_vec());
            let guard = self.tracker.acquire();
            if self.fail {
                return Err(RankError::other("simulated read failure"));
            }
            let hits = self
                .hits
                .iter()
                .filter(|hit| doc_ids.contains(&hit.doc_id))
                .cloned()
                .collect();
            Ok(FetchedFields::new(hits, guard))
        }
    }

    fn hit(doc_id: u32, value: &str) -> FetchedHit {
        FetchedHit::new(doc_id).with_value("rank_field", FeatureValue::from(value))
    }

    #[test]
    fn test_extract_attaches_payloads_in_doc_id_order() {
        let source = TestSource::new(vec![hit(42, "42"), hit(84, "84")]);
        let extractor = FieldExtractor::single("rank_field");

        let docs = vec![RankedDocument::new(84, 9.0, 0), RankedDocument::new(42, 10.0, 0)];
        let batch = extractor.extract(0, docs, &source).unwrap();

        assert_eq!(batch.shard_index, 0);
        assert_eq!(batch.docs.len(), 2);
        assert_eq!(batch.docs[0].doc_id, 42);
        assert_eq!(batch.docs[0].score, 10.0);
        assert_eq!(
            batch.docs[0].feature_payload,
            Some(vec![FeatureValue::from("42")])
        );
        assert_eq!(batch.docs[1].doc_id, 84);
        assert_eq!(source.requested.lock().clone(), vec![vec![42, 84]]);
        assert_eq!(source.tracker.outstanding(), 0);
    }

    #[test]
    fn test_absent_field_is_explicit_missing() {
        let source = TestSource::new(vec![FetchedHit::new(1)]);
        let extractor = FieldExtractor::new(vec!["a".to_string(), "b".to_string()]);

        let batch = extractor
            .extract(0, vec![RankedDocument::new(1, 1.0, 0)], &source)
            .unwrap();
        assert_eq!(
            batch.docs[0].feature_payload,
            Some(vec![FeatureValue::Missing, FeatureValue::Missing])
        );
    }

    #[test]
    fn test_read_failure_fails_whole_batch_and_releases() {
        let mut source = TestSource::new(vec![hit(1, "1")]);
        source.fail = true;
        let extractor = FieldExtractor::single("rank_field");

        let result = extractor.extract(2, vec![RankedDocument::new(1, 1.0, 2)], &source);
        match result {
            Err(RankError::ShardExecution { shard_index, .. }) => {
                assert_eq!(shard_index, Some(2))
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(source.tracker.acquired(), 1);
        assert_eq!(source.tracker.outstanding(), 0);
    }

    #[test]
    fn test_unknown_doc_fails_batch_and_releases() {
        let source = TestSource::new(vec![hit(1, "1")]);
        let extractor = FieldExtractor::single("rank_field");

        let docs = vec![RankedDocument::new(1, 1.0, 0), RankedDocument::new(2, 0.5, 0)];
        assert!(extractor.extract(0, docs, &source).is_err());
        assert_eq!(source.tracker.acquired(), 1);
        assert_eq!(source.tracker.outstanding(), 0);
    }

    #[test]
    fn test_empty_request_does_not_fetch() {
        let source = TestSource::new(Vec::new());
        let extractor = FieldExtractor::single("rank_field");

        let batch = extractor.extract(0, Vec::new(), &source).unwrap();
        assert!(batch.is_empty());
        assert_eq!(source.tracker.acquired(), 0);
    }
}

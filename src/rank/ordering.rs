//! Total ordering of ranked documents.
//!
//! Every sort in the pipeline uses the same total order so results never
//! depend on shard response arrival order or on sort stability:
//! score descending, then shard index ascending, then doc id ascending.
//! NaN scores sort after every real score.

use std::cmp::Ordering;

use crate::rank::document::RankedDocument;

#[inline]
fn normalize(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Compare two scores so that higher scores come first.
#[inline]
pub fn cmp_score_desc(a: f32, b: f32) -> Ordering {
    normalize(b).total_cmp(&normalize(a))
}

/// Compare two documents by score desc, shard index asc, doc id asc.
pub fn cmp_total_order(a: &RankedDocument, b: &RankedDocument) -> Ordering {
    cmp_score_desc(a.score, b.score)
        .then_with(|| a.shard_index.cmp(&b.shard_index))
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Sort documents in place by [`cmp_total_order`].
pub fn sort_total_order(docs: &mut [RankedDocument]) {
    docs.sort_by(cmp_total_order);
}

//! Filter helpers for Qdrant search queries.

use crate::artifact::ArtifactKind;
use serde_json::{Value, json};

use super::payload::KIND_KEY;

/// Restrict a query to summaries of one artifact kind.
pub fn build_kind_filter(kind: Option<ArtifactKind>) -> Option<Value> {
    kind.map(|kind| {
        json!({
            "must": [
                {
                    "key": KIND_KEY,
                    "match": { "value": kind.as_str() }
                }
            ]
        })
    })
}

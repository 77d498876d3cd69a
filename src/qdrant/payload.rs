//! Helpers for constructing and reading summary payloads.

use crate::artifact::ArtifactKind;
use crate::index::{SummaryHit, SummaryPoint};
use crate::qdrant::types::ScoredPoint;
use serde_json::{Map, Value};

/// Payload key joining a vector to its original in the content store.
pub const DOC_ID_KEY: &str = "doc_id";
/// Payload key holding the artifact kind.
pub const KIND_KEY: &str = "kind";
/// Payload key holding the summary text.
pub const SUMMARY_KEY: &str = "summary";

/// Build the payload object stored alongside each summary vector.
pub(crate) fn build_payload(point: &SummaryPoint, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(DOC_ID_KEY.into(), Value::String(point.doc_id.clone()));
    payload.insert(KIND_KEY.into(), Value::String(point.kind.as_str().into()));
    payload.insert(SUMMARY_KEY.into(), Value::String(point.summary.clone()));
    payload.insert(
        "indexed_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Map a Qdrant scored point into a summary hit.
pub(crate) fn map_scored_point(point: ScoredPoint) -> SummaryHit {
    let ScoredPoint { id, score, payload } = point;
    let mut hit = SummaryHit {
        point_id: id,
        score,
        doc_id: None,
        kind: None,
        summary: None,
    };

    if let Some(mut map) = payload {
        if let Some(Value::String(value)) = map.remove(DOC_ID_KEY) {
            hit.doc_id = Some(value).filter(|value| !value.trim().is_empty());
        }
        if let Some(Value::String(value)) = map.remove(KIND_KEY) {
            hit.kind = value.parse::<ArtifactKind>().ok();
        }
        if let Some(Value::String(value)) = map.remove(SUMMARY_KEY) {
            hit.summary = Some(value);
        }
    }

    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_join_key_and_kind() {
        let point = SummaryPoint {
            point_id: "p-1".into(),
            vector: vec![0.1],
            doc_id: "doc-1".into(),
            kind: ArtifactKind::Table,
            summary: "Revenue by year".into(),
        };
        let payload = build_payload(&point, "2025-01-01T00:00:00Z");
        assert_eq!(payload["doc_id"], "doc-1");
        assert_eq!(payload["kind"], "table");
        assert_eq!(payload["summary"], "Revenue by year");
        assert_eq!(payload["indexed_at"], "2025-01-01T00:00:00Z");
    }

    #[test]
    fn map_scored_point_tolerates_missing_fields() {
        let mut payload = Map::new();
        payload.insert("doc_id".into(), Value::String("doc-9".into()));
        payload.insert("kind".into(), Value::String("mystery".into()));

        let hit = map_scored_point(ScoredPoint {
            id: "p-9".into(),
            score: 0.5,
            payload: Some(payload),
        });
        assert_eq!(hit.doc_id.as_deref(), Some("doc-9"));
        assert!(hit.kind.is_none());
        assert!(hit.summary.is_none());

        let bare = map_scored_point(ScoredPoint {
            id: "p-0".into(),
            score: 0.1,
            payload: None,
        });
        assert!(bare.doc_id.is_none());
    }
}

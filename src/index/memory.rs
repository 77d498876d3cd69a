//! In-memory [`VectorStore`] for local runs and tests.
//!
//! Vector search is brute-force cosine similarity over the collection's points. Contents are
//! lost when the process exits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::vector::{SummaryHit, SummaryPoint, VectorStore, VectorStoreError};
use crate::artifact::ArtifactKind;

struct MemoryCollection {
    vector_size: usize,
    points: Vec<SummaryPoint>,
}

/// Process-local vector index.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection, if it exists.
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(|stored| stored.points.len())
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(collection))
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<(), VectorStoreError> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection {
                vector_size,
                points: Vec::new(),
            });
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<SummaryPoint>,
    ) -> Result<usize, VectorStoreError> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::MissingCollection(collection.to_string()))?;

        if let Some(bad) = points
            .iter()
            .find(|point| point.vector.len() != stored.vector_size)
        {
            return Err(VectorStoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: stored.vector_size,
                actual: bad.vector.len(),
            });
        }

        let count = points.len();
        for point in points {
            stored
                .points
                .retain(|existing| existing.point_id != point.point_id);
            stored.points.push(point);
        }
        Ok(count)
    }

    async fn delete_points(
        &self,
        collection: &str,
        point_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if let Some(stored) = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(collection)
        {
            stored.points.retain(|point| !point_ids.contains(&point.point_id));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<SummaryHit>, VectorStoreError> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::MissingCollection(collection.to_string()))?;

        let mut hits: Vec<SummaryHit> = stored
            .points
            .iter()
            .filter(|point| kind.is_none_or(|kind| point.kind == kind))
            .map(|point| SummaryHit {
                point_id: point.point_id.clone(),
                score: cosine_similarity(&vector, &point.vector),
                doc_id: Some(point.doc_id.clone()),
                kind: Some(point.kind),
                summary: Some(point.summary.clone()),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

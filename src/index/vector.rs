//! Logical contract the dual-store index requires from a vector index.

use crate::artifact::ArtifactKind;
use crate::qdrant::QdrantError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by vector index backends.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Qdrant transport or response failure.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// The requested collection has not been created.
    #[error("Collection '{0}' does not exist")]
    MissingCollection(String),
    /// A vector's length does not match the collection's configured size.
    #[error("Vector dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Target collection.
        collection: String,
        /// Size the collection was created with.
        expected: usize,
        /// Length of the rejected vector.
        actual: usize,
    },
}

/// Summary vector plus the metadata that joins it to its original.
#[derive(Debug, Clone)]
pub struct SummaryPoint {
    /// Vector-store point identifier.
    pub point_id: String,
    /// Embedding of the summary.
    pub vector: Vec<f32>,
    /// Content-store key of the original artifact.
    pub doc_id: String,
    /// Kind of the original artifact.
    pub kind: ArtifactKind,
    /// Summary text the vector was computed from.
    pub summary: String,
}

/// Scored match returned by a similarity search.
#[derive(Debug, Clone)]
pub struct SummaryHit {
    /// Vector-store point identifier.
    pub point_id: String,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Content-store key, when the payload carried one.
    pub doc_id: Option<String>,
    /// Artifact kind, when the payload carried one.
    pub kind: Option<ArtifactKind>,
    /// Summary text, when the payload carried one.
    pub summary: Option<String>,
}

/// Similarity-searchable store of summary vectors, namespaced by collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether the collection exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError>;

    /// Create the collection when missing. Existing collections are left untouched.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<(), VectorStoreError>;

    /// Insert points; the call either stores every point or fails.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<SummaryPoint>,
    ) -> Result<usize, VectorStoreError>;

    /// Remove points by id, waiting until the removal is applied. Unknown ids are ignored.
    async fn delete_points(
        &self,
        collection: &str,
        point_ids: &[String],
    ) -> Result<(), VectorStoreError>;

    /// Nearest neighbours of `vector`, best first, optionally restricted to one artifact kind.
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<SummaryHit>, VectorStoreError>;
}

//! Dual-Store Index: summary vectors in a vector index, originals in a content store.
//!
//! Only summaries are embedded and searched. Every vector carries the `doc_id` of exactly one
//! original in the session's [`ContentStore`], and a successful [`DualStoreIndex::index`] call
//! leaves every artifact present in both halves or in neither.

mod content;
mod memory;
mod session;
mod vector;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind, SummarizedArtifact};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::session::{SessionStore, SessionStoreError};

pub use content::ContentStore;
pub use memory::MemoryVectorStore;
pub use session::{ContentState, SessionIndex};
pub use vector::{SummaryHit, SummaryPoint, VectorStore, VectorStoreError};

/// Errors raised by indexing, retrieval, and rehydration.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding provider failed.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index failed.
    #[error("Vector store failed: {0}")]
    VectorStore(#[from] VectorStoreError),
    /// Persisted session could not be loaded.
    #[error("Session store failed: {0}")]
    Session(#[from] SessionStoreError),
    /// Embedding length differs from the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension {
        /// Configured dimension.
        expected: usize,
        /// Length returned by the provider.
        actual: usize,
    },
}

/// Result of one indexing call.
#[derive(Debug, Clone, Default)]
pub struct IndexOutcome {
    /// Identifiers assigned to the indexed artifacts, in input order.
    pub doc_ids: Vec<String>,
}

impl IndexOutcome {
    /// Number of artifacts indexed.
    pub fn indexed(&self) -> usize {
        self.doc_ids.len()
    }
}

/// Original artifact resolved from a similarity match.
#[derive(Debug, Clone)]
pub struct RetrievedArtifact {
    /// Content-store key.
    pub doc_id: String,
    /// Original content, verbatim.
    pub artifact: Artifact,
    /// Similarity between the query and the artifact's summary.
    pub score: f32,
}

/// Couples a [`VectorStore`] with per-session content stores through `doc_id`.
pub struct DualStoreIndex {
    vectors: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    dimension: usize,
    history_capacity: usize,
}

impl DualStoreIndex {
    /// Build an index over the given backends. `dimension` is the embedding vector length.
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        dimension: usize,
    ) -> Self {
        Self {
            vectors,
            embeddings,
            dimension,
            history_capacity: 20,
        }
    }

    /// Cap on exchanges retained by session handles created from this index.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Create the collection for a new session and return its empty handle.
    pub async fn open_session(
        &self,
        session_id: &str,
        collection_name: &str,
    ) -> Result<SessionIndex, IndexError> {
        self.vectors
            .ensure_collection(collection_name, self.dimension)
            .await?;
        tracing::debug!(session_id, collection = collection_name, "Session collection ready");
        Ok(SessionIndex::new(
            session_id.to_string(),
            collection_name.to_string(),
            ContentStore::new(),
            Vec::new(),
            ContentState::Complete,
            self.history_capacity,
        ))
    }

    /// Index summarized artifacts into the session.
    ///
    /// Summaries are embedded before anything is written. Originals are then inserted into the
    /// content store and the vectors upserted in one batch. If the upsert reports an error, the
    /// originals are removed and the batch's point ids are deleted from the vector store, since
    /// the write may have been applied before the failure was reported.
    pub async fn index(
        &self,
        session: &SessionIndex,
        artifacts: Vec<SummarizedArtifact>,
    ) -> Result<IndexOutcome, IndexError> {
        if artifacts.is_empty() {
            return Ok(IndexOutcome::default());
        }

        let summaries: Vec<String> = artifacts.iter().map(|item| item.summary.clone()).collect();
        let vectors = self.embed(summaries).await?;

        let mut doc_ids = Vec::with_capacity(artifacts.len());
        let mut points = Vec::with_capacity(artifacts.len());
        let mut originals = Vec::with_capacity(artifacts.len());
        for (item, vector) in artifacts.into_iter().zip(vectors) {
            let doc_id = Uuid::new_v4().to_string();
            points.push(SummaryPoint {
                point_id: Uuid::new_v4().to_string(),
                vector,
                doc_id: doc_id.clone(),
                kind: item.artifact.kind(),
                summary: item.summary,
            });
            originals.push((doc_id.clone(), item.artifact));
            doc_ids.push(doc_id);
        }

        let point_ids: Vec<String> = points.iter().map(|point| point.point_id.clone()).collect();
        session.content().insert_many(originals);
        if let Err(error) = self.vectors.upsert(session.collection_name(), points).await {
            session.content().remove_many(&doc_ids);
            if let Err(cleanup) = self
                .vectors
                .delete_points(session.collection_name(), &point_ids)
                .await
            {
                tracing::error!(
                    session_id = session.session_id(),
                    collection = session.collection_name(),
                    points = point_ids.len(),
                    error = %cleanup,
                    "Vector rollback failed; points may be left without content"
                );
            }
            tracing::warn!(
                session_id = session.session_id(),
                collection = session.collection_name(),
                %error,
                "Vector upsert failed; rolled back content entries and points"
            );
            return Err(error.into());
        }

        tracing::debug!(
            session_id = session.session_id(),
            collection = session.collection_name(),
            indexed = doc_ids.len(),
            "Artifacts indexed"
        );
        Ok(IndexOutcome { doc_ids })
    }

    /// Up to `k` originals whose summaries are closest to `query`, best first.
    ///
    /// Returns an empty list when the session's collection does not exist. Matches whose
    /// `doc_id` cannot be resolved in the content store are skipped.
    pub async fn retrieve(
        &self,
        session: &SessionIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedArtifact>, IndexError> {
        let hits = self.search_summaries(session, query, k, None).await?;
        let mut retrieved = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(doc_id) = hit.doc_id else {
                tracing::debug!(point_id = %hit.point_id, "Match carries no doc_id");
                continue;
            };
            match session.content().get(&doc_id) {
                Some(artifact) => retrieved.push(RetrievedArtifact {
                    doc_id,
                    artifact,
                    score: hit.score,
                }),
                None => tracing::debug!(
                    session_id = session.session_id(),
                    doc_id,
                    "Match not resolvable in content store"
                ),
            }
        }
        Ok(retrieved)
    }

    /// Raw summary matches for `query`, optionally restricted to one artifact kind.
    pub async fn search_summaries(
        &self,
        session: &SessionIndex,
        query: &str,
        k: usize,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<SummaryHit>, IndexError> {
        if k == 0 || !self.vectors.collection_exists(session.collection_name()).await? {
            return Ok(Vec::new());
        }
        let mut vectors = self.embed(vec![query.to_string()]).await?;
        let Some(vector) = vectors.pop() else {
            return Ok(Vec::new());
        };
        let mut hits = self
            .vectors
            .search(session.collection_name(), vector, k, kind)
            .await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    /// Rebuild a session handle from its persisted record.
    ///
    /// The handle's [`ContentState`] reports what could be restored: the full content store,
    /// only the raw image list, or nothing beyond the collection binding.
    pub async fn rehydrate(
        &self,
        store: &SessionStore,
        session_id: &str,
    ) -> Result<SessionIndex, IndexError> {
        let record = store.load_record(session_id).await?;
        let images = store.load_images(session_id).await?;
        let content = store.load_content(session_id, &images).await?;

        let (content, state) = match content {
            Some(entries) => (ContentStore::from_entries(entries), ContentState::Complete),
            None if !images.is_empty() => (ContentStore::new(), ContentState::ImagesOnly),
            None => (ContentStore::new(), ContentState::Empty),
        };
        tracing::info!(
            session_id,
            collection = %record.collection_name,
            content_state = ?state,
            originals = content.len(),
            images = images.len(),
            "Session rehydrated"
        );
        Ok(SessionIndex::new(
            record.session_id,
            record.collection_name,
            content,
            images,
            state,
            self.history_capacity,
        ))
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, IndexError> {
        let vectors = self.embeddings.generate_embeddings(texts).await?;
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimension) {
            return Err(IndexError::Dimension {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ImageData;
    use crate::embedding::HashEmbeddingClient;
    use crate::session::SessionRecord;
    use async_trait::async_trait;
    use tempfile::tempdir;

    const DIM: usize = 64;

    fn index_over(vectors: Arc<dyn VectorStore>) -> DualStoreIndex {
        DualStoreIndex::new(vectors, Arc::new(HashEmbeddingClient::new(DIM)), DIM)
    }

    fn summarized(artifact: Artifact, summary: &str) -> SummarizedArtifact {
        SummarizedArtifact {
            artifact,
            summary: summary.into(),
        }
    }

    #[tokio::test]
    async fn round_trip_returns_original_verbatim() {
        let index = index_over(Arc::new(MemoryVectorStore::new()));
        let session = index.open_session("s1", "pdf-s1").await.expect("open");
        let table = "<table><tr><td>42</td></tr></table>";
        let image = ImageData::new(vec![0xff, 0xd8, 0xff, 0x00, 0x10]);
        index
            .index(
                &session,
                vec![
                    summarized(Artifact::Text("Rivers flow downhill.".into()), "geography of rivers"),
                    summarized(Artifact::Table(table.into()), "answer to everything table"),
                    summarized(Artifact::Image(image.clone()), "diagram of attention heads"),
                ],
            )
            .await
            .expect("index");

        let hits = index
            .retrieve(&session, "answer to everything table", 1)
            .await
            .expect("retrieve");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artifact, Artifact::Table(table.into()));

        let hits = index
            .retrieve(&session, "diagram of attention heads", 1)
            .await
            .expect("retrieve image");
        assert_eq!(hits[0].artifact.as_image(), Some(&image));
    }

    #[tokio::test]
    async fn retrieve_orders_by_descending_similarity() {
        let index = index_over(Arc::new(MemoryVectorStore::new()));
        let session = index.open_session("s1", "pdf-s1").await.expect("open");
        index
            .index(
                &session,
                vec![
                    summarized(Artifact::Text("a".into()), "solar panels efficiency"),
                    summarized(Artifact::Text("b".into()), "solar panels efficiency in winter"),
                    summarized(Artifact::Text("c".into()), "medieval poetry"),
                ],
            )
            .await
            .expect("index");
        let hits = index
            .retrieve(&session, "solar panels efficiency", 3)
            .await
            .expect("retrieve");
        assert_eq!(hits[0].artifact, Artifact::Text("a".into()));
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn missing_collection_retrieves_nothing() {
        let index = index_over(Arc::new(MemoryVectorStore::new()));
        let session = SessionIndex::new(
            "ghost".into(),
            "pdf-ghost".into(),
            ContentStore::new(),
            Vec::new(),
            ContentState::Empty,
            1,
        );
        let hits = index.retrieve(&session, "anything", 4).await.expect("retrieve");
        assert!(hits.is_empty());
    }

    /// Applies the write, then reports failure as if the response had been lost.
    struct AppliedThenFailed(Arc<MemoryVectorStore>);

    #[async_trait]
    impl VectorStore for AppliedThenFailed {
        async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
            self.0.collection_exists(collection).await
        }

        async fn ensure_collection(
            &self,
            collection: &str,
            vector_size: usize,
        ) -> Result<(), VectorStoreError> {
            self.0.ensure_collection(collection, vector_size).await
        }

        async fn upsert(
            &self,
            collection: &str,
            points: Vec<SummaryPoint>,
        ) -> Result<usize, VectorStoreError> {
            self.0.upsert(collection, points).await?;
            Err(VectorStoreError::MissingCollection(collection.to_string()))
        }

        async fn delete_points(
            &self,
            collection: &str,
            point_ids: &[String],
        ) -> Result<(), VectorStoreError> {
            self.0.delete_points(collection, point_ids).await
        }

        async fn search(
            &self,
            collection: &str,
            vector: Vec<f32>,
            limit: usize,
            kind: Option<ArtifactKind>,
        ) -> Result<Vec<SummaryHit>, VectorStoreError> {
            self.0.search(collection, vector, limit, kind).await
        }
    }

    #[tokio::test]
    async fn failed_upsert_rolls_back_both_stores() {
        let memory = Arc::new(MemoryVectorStore::new());
        let index = index_over(Arc::new(AppliedThenFailed(memory.clone())));
        let session = index.open_session("s1", "pdf-s1").await.expect("open");
        let result = index
            .index(
                &session,
                vec![
                    summarized(Artifact::Text("x".into()), "x"),
                    summarized(Artifact::Table("<table/>".into()), "y"),
                ],
            )
            .await;

        assert!(matches!(result, Err(IndexError::VectorStore(_))));
        assert!(session.content().is_empty());
        assert_eq!(memory.point_count("pdf-s1"), Some(0));
        let hits = index
            .search_summaries(&session, "x", 5, None)
            .await
            .expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected_before_writes() {
        let index = DualStoreIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbeddingClient::new(DIM)),
            DIM + 1,
        );
        let session = index.open_session("s1", "pdf-s1").await.expect("open");
        let result = index
            .index(&session, vec![summarized(Artifact::Text("x".into()), "x")])
            .await;
        assert!(matches!(result, Err(IndexError::Dimension { .. })));
        assert!(session.content().is_empty());
    }

    #[tokio::test]
    async fn rehydrate_reports_content_state() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        let index = index_over(Arc::new(MemoryVectorStore::new()));

        store
            .save_record(&SessionRecord::new("bare".into(), "pdf-bare".into(), b"x"))
            .await
            .expect("record");
        let bare = index.rehydrate(&store, "bare").await.expect("bare");
        assert_eq!(bare.content_state(), ContentState::Empty);

        store
            .save_images("pics", &[ImageData::new(vec![1, 2, 3])])
            .await
            .expect("images");
        store
            .save_record(&SessionRecord::new("pics".into(), "pdf-pics".into(), b"y"))
            .await
            .expect("record");
        let pics = index.rehydrate(&store, "pics").await.expect("pics");
        assert_eq!(pics.content_state(), ContentState::ImagesOnly);
        assert_eq!(pics.images().len(), 1);

        assert!(matches!(
            index.rehydrate(&store, "unknown").await,
            Err(IndexError::Session(SessionStoreError::NotFound(_)))
        ));
    }
}

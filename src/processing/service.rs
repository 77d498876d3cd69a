//! Ingestion pipeline: extraction, summarization, dual-store indexing, and session persistence.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind, ImageData};
use crate::extraction::{ArtifactExtractor, ExtractionConfig, ExtractionError};
use crate::generation::GenerationError;
use crate::index::{DualStoreIndex, IndexError, SessionIndex};
use crate::metrics::PipelineMetrics;
use crate::processing::{Summarizer, sanitize_collection_name};
use crate::session::{ArtifactCounts, SessionRecord, SessionRegistry, SessionStore, SessionStoreError};

/// Errors raised by ingestion, naming the stage that failed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The partitioner failed; no session was created.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// The session's collection could not be created.
    #[error("Failed to open index for session {session_id}: {source}")]
    OpenSession {
        /// Session being created.
        session_id: String,
        /// Underlying error.
        #[source]
        source: IndexError,
    },
    /// A text or table summarization batch failed.
    #[error("Summarization of {kind} artifacts failed for session {session_id}: {source}")]
    Summarization {
        /// Session being ingested.
        session_id: String,
        /// Kind whose batch failed.
        kind: ArtifactKind,
        /// Underlying error.
        #[source]
        source: GenerationError,
    },
    /// Summaries could not be indexed.
    #[error("Indexing of {kind} artifacts failed for session {session_id}: {source}")]
    Indexing {
        /// Session being ingested.
        session_id: String,
        /// Kind whose indexing failed.
        kind: ArtifactKind,
        /// Underlying error.
        #[source]
        source: IndexError,
    },
    /// Session files could not be written.
    #[error("Persisting session {session_id} failed: {source}")]
    Persistence {
        /// Session being ingested.
        session_id: String,
        /// Underlying error.
        #[source]
        source: SessionStoreError,
    },
}

impl IngestError {
    /// Short name of the failing stage.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction",
            Self::OpenSession { .. } => "open_session",
            Self::Summarization { .. } => "summarization",
            Self::Indexing { .. } => "indexing",
            Self::Persistence { .. } => "persistence",
        }
    }

    /// Session the failure belongs to, once one had been created.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Extraction(_) => None,
            Self::OpenSession { session_id, .. }
            | Self::Summarization { session_id, .. }
            | Self::Indexing { session_id, .. }
            | Self::Persistence { session_id, .. } => Some(session_id),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Newly created session.
    pub session_id: String,
    /// Collection holding the session's summaries.
    pub collection_name: String,
    /// Artifacts indexed per kind.
    pub counts: ArtifactCounts,
}

/// Runs one document through extraction, summarization, indexing, and persistence.
pub struct IngestionService {
    extractor: ArtifactExtractor,
    summarizer: Summarizer,
    index: Arc<DualStoreIndex>,
    store: SessionStore,
    registry: Arc<SessionRegistry>,
    metrics: Arc<PipelineMetrics>,
    persist_content: bool,
}

impl IngestionService {
    /// Assemble the pipeline from its collaborators.
    pub fn new(
        extractor: ArtifactExtractor,
        summarizer: Summarizer,
        index: Arc<DualStoreIndex>,
        store: SessionStore,
        registry: Arc<SessionRegistry>,
        metrics: Arc<PipelineMetrics>,
        persist_content: bool,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            index,
            store,
            registry,
            metrics,
            persist_content,
        }
    }

    /// Ingest a document and return the new session.
    ///
    /// Text is indexed before tables and tables before images. A failed text or table batch
    /// ends ingestion with an error; kinds indexed before the failure stay queryable through
    /// the in-memory handle but the session is not persisted. Image descriptions are
    /// best-effort and a failed image is left out of the index.
    pub async fn ingest(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<IngestOutcome, IngestError> {
        let result = self.run(document, config).await;
        match &result {
            Ok(outcome) => self.metrics.record_ingestion(&outcome.counts),
            Err(error) => {
                self.metrics.record_ingest_failure();
                tracing::error!(stage = error.stage(), session_id = error.session_id(), %error, "Ingestion failed");
            }
        }
        result
    }

    async fn run(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<IngestOutcome, IngestError> {
        let elements = self.extractor.extract(document, config).await?;

        let mut texts = Vec::new();
        let mut tables = Vec::new();
        let mut images: Vec<ImageData> = Vec::new();
        for element in elements {
            match element.artifact {
                artifact @ Artifact::Text(_) => texts.push(artifact),
                artifact @ Artifact::Table(_) => tables.push(artifact),
                Artifact::Image(image) => images.push(image),
            }
        }

        let session_id = Uuid::new_v4().simple().to_string();
        let collection_name = sanitize_collection_name(&format!("pdf-{session_id}"));
        tracing::info!(
            session_id,
            collection = collection_name,
            texts = texts.len(),
            tables = tables.len(),
            images = images.len(),
            "Ingesting document"
        );

        let handle = self
            .index
            .open_session(&session_id, &collection_name)
            .await
            .map_err(|source| IngestError::OpenSession {
                session_id: session_id.clone(),
                source,
            })?;
        handle.set_images(images.clone());
        let handle = self.registry.insert(Arc::new(handle)).await;

        let mut record = SessionRecord::new(session_id.clone(), collection_name.clone(), document);
        record.counts.texts = self
            .summarize_and_index(&handle, ArtifactKind::Text, texts)
            .await?;
        record.counts.tables = self
            .summarize_and_index(&handle, ArtifactKind::Table, tables)
            .await?;

        let descriptions = self.summarizer.describe_images(&images).await;
        record.counts.images_skipped = descriptions.skipped;
        record.counts.images = self
            .index
            .index(&handle, descriptions.described)
            .await
            .map_err(|source| IngestError::Indexing {
                session_id: session_id.clone(),
                kind: ArtifactKind::Image,
                source,
            })?
            .indexed();

        self.persist(&handle, &mut record).await?;
        tracing::info!(
            session_id,
            texts = record.counts.texts,
            tables = record.counts.tables,
            images = record.counts.images,
            images_skipped = record.counts.images_skipped,
            "Document ingested"
        );

        Ok(IngestOutcome {
            session_id,
            collection_name,
            counts: record.counts,
        })
    }

    async fn summarize_and_index(
        &self,
        handle: &SessionIndex,
        kind: ArtifactKind,
        artifacts: Vec<Artifact>,
    ) -> Result<usize, IngestError> {
        if artifacts.is_empty() {
            return Ok(0);
        }
        let summarized = self
            .summarizer
            .summarize_batch(artifacts)
            .await
            .map_err(|source| IngestError::Summarization {
                session_id: handle.session_id().to_string(),
                kind,
                source,
            })?;
        let outcome = self
            .index
            .index(handle, summarized)
            .await
            .map_err(|source| IngestError::Indexing {
                session_id: handle.session_id().to_string(),
                kind,
                source,
            })?;
        tracing::debug!(
            session_id = handle.session_id(),
            kind = %kind,
            indexed = outcome.indexed(),
            "Kind indexed"
        );
        Ok(outcome.indexed())
    }

    async fn persist(
        &self,
        handle: &SessionIndex,
        record: &mut SessionRecord,
    ) -> Result<(), IngestError> {
        let session_id = record.session_id.clone();
        let to_error = |source| IngestError::Persistence {
            session_id: session_id.clone(),
            source,
        };
        let images = handle.images();
        self.store
            .save_images(handle.session_id(), &images)
            .await
            .map_err(to_error)?;
        if self.persist_content {
            self.store
                .save_content(handle.session_id(), &handle.content().snapshot(), &images)
                .await
                .map_err(to_error)?;
        }
        record.content_persisted = self.persist_content;
        self.store.save_record(record).await.map_err(to_error)
    }
}

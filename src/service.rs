//! Service facade wiring extraction, summarization, indexing, and QA together.
//!
//! Both the HTTP router and the CLI talk to the pipeline through [`RagApi`], so either surface
//! can be exercised against a stub in tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, ConfigError, VectorStoreKind};
use crate::embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client};
use crate::extraction::{
    ArtifactExtractor, DocumentPartitioner, ExtractionConfig, ExtractionError, get_partitioner,
};
use crate::generation::{GenerationError, TextGenerationClient, get_generation_client};
use crate::index::{DualStoreIndex, MemoryVectorStore, VectorStore};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::processing::{IngestError, IngestOutcome, IngestionService, Summarizer};
use crate::qa::{Answer, QaError, QaService};
use crate::qdrant::{QdrantError, QdrantService};
use crate::session::{Exchange, SessionRecord, SessionRegistry, SessionStore, SessionStoreError};

/// Errors raised while assembling the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Embedding client could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Generation client could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Partitioner could not be built.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Qdrant transport could not be built.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
}

/// Operations exposed to external surfaces (HTTP, CLI).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Ingest a document and create a session for it.
    async fn ingest(
        &self,
        document: Vec<u8>,
        config: ExtractionConfig,
    ) -> Result<IngestOutcome, IngestError>;

    /// Answer a question against a session.
    async fn ask(&self, session_id: &str, question: &str) -> Result<Answer, QaError>;

    /// Exchanges recorded for a session.
    async fn history(&self, session_id: &str) -> Result<Vec<Exchange>, QaError>;

    /// Persisted sessions, newest first.
    async fn sessions(&self) -> Result<Vec<SessionRecord>, SessionStoreError>;

    /// Current pipeline counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Tunables shared by the pipeline components.
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Embedding vector length.
    pub embedding_dimension: usize,
    /// Model summarizing text and tables.
    pub summary_model: String,
    /// Model describing images.
    pub vision_model: String,
    /// Model answering questions.
    pub answer_model: String,
    /// Session store root.
    pub data_dir: PathBuf,
    /// Persist original artifacts alongside the session record.
    pub persist_content_store: bool,
    /// Originals retrieved per question.
    pub retrieval_top_k: usize,
    /// In-flight summarization calls.
    pub summary_concurrency: usize,
    /// Exchanges retained per session.
    pub history_max_exchanges: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            embedding_dimension: 384,
            summary_model: "llama3.2".into(),
            vision_model: "llava".into(),
            answer_model: "llama3.2".into(),
            data_dir: PathBuf::from("./rag_data"),
            persist_content_store: true,
            retrieval_top_k: 4,
            summary_concurrency: 3,
            history_max_exchanges: 20,
        }
    }
}

impl From<&Config> for RagSettings {
    fn from(config: &Config) -> Self {
        Self {
            embedding_dimension: config.embedding_dimension,
            summary_model: config.summary_model.clone(),
            vision_model: config.vision_model.clone(),
            answer_model: config.answer_model.clone(),
            data_dir: config.data_dir.clone(),
            persist_content_store: config.persist_content_store,
            retrieval_top_k: config.retrieval_top_k,
            summary_concurrency: config.summary_concurrency,
            history_max_exchanges: config.history_max_exchanges,
        }
    }
}

/// External capabilities the pipeline is built from.
pub struct RagComponents {
    /// Document partitioning backend.
    pub partitioner: Arc<dyn DocumentPartitioner>,
    /// Vector index backend.
    pub vectors: Arc<dyn VectorStore>,
    /// Embedding backend.
    pub embeddings: Arc<dyn EmbeddingClient>,
    /// Text-generation backend.
    pub generator: Arc<dyn TextGenerationClient>,
}

/// Long-lived pipeline shared by every request.
///
/// Construct once near process start and share it through an `Arc`.
pub struct RagService {
    ingestion: IngestionService,
    qa: QaService,
    store: SessionStore,
    registry: Arc<SessionRegistry>,
    metrics: Arc<PipelineMetrics>,
}

impl RagService {
    /// Assemble the pipeline from explicit components.
    pub fn new(components: RagComponents, settings: RagSettings) -> Self {
        let RagComponents {
            partitioner,
            vectors,
            embeddings,
            generator,
        } = components;

        let index = Arc::new(
            DualStoreIndex::new(vectors, embeddings, settings.embedding_dimension)
                .with_history_capacity(settings.history_max_exchanges),
        );
        let store = SessionStore::new(settings.data_dir.clone());
        let registry = Arc::new(SessionRegistry::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let summarizer = Summarizer::new(
            generator.clone(),
            settings.summary_model.clone(),
            settings.vision_model.clone(),
            settings.summary_concurrency,
        );

        let ingestion = IngestionService::new(
            ArtifactExtractor::new(partitioner),
            summarizer,
            index.clone(),
            store.clone(),
            registry.clone(),
            metrics.clone(),
            settings.persist_content_store,
        );
        let qa = QaService::new(
            index,
            store.clone(),
            registry.clone(),
            generator,
            settings.answer_model.clone(),
            settings.retrieval_top_k,
            metrics.clone(),
        );

        Self {
            ingestion,
            qa,
            store,
            registry,
            metrics,
        }
    }

    /// Build the pipeline selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let vectors: Arc<dyn VectorStore> = match config.vector_store {
            VectorStoreKind::Qdrant => {
                let url = config
                    .qdrant_url
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingVariable("QDRANT_URL".into()))?;
                Arc::new(QdrantService::new(url, config.qdrant_api_key.clone())?)
            }
            VectorStoreKind::Memory => Arc::new(MemoryVectorStore::new()),
        };
        let components = RagComponents {
            partitioner: get_partitioner(config)?,
            vectors,
            embeddings: get_embedding_client(config)?,
            generator: get_generation_client(config)?,
        };
        tracing::info!(
            vector_store = ?config.vector_store,
            extractor = ?config.extractor_provider,
            data_dir = %config.data_dir.display(),
            "RAG service initialized"
        );
        Ok(Self::new(components, RagSettings::from(config)))
    }

    /// Identifiers of sessions active in this process.
    pub async fn active_sessions(&self) -> Vec<String> {
        self.registry.session_ids().await
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest(
        &self,
        document: Vec<u8>,
        config: ExtractionConfig,
    ) -> Result<IngestOutcome, IngestError> {
        self.ingestion.ingest(&document, &config).await
    }

    async fn ask(&self, session_id: &str, question: &str) -> Result<Answer, QaError> {
        self.qa.ask(session_id, question).await
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Exchange>, QaError> {
        self.qa.history(session_id).await
    }

    async fn sessions(&self) -> Result<Vec<SessionRecord>, SessionStoreError> {
        self.store.list_sessions().await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

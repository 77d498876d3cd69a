use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Rusty RAG server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend holding the summary vectors.
    pub vector_store: VectorStoreKind,
    /// Base URL of the Qdrant instance that stores summary embeddings.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to vectorize summaries and questions.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional override for the embedding endpoint.
    pub embedding_url: Option<String>,
    /// Optional bearer token for the embedding endpoint.
    pub embedding_api_key: Option<String>,
    /// Text-generation provider used for summaries, image descriptions, and answers.
    pub generation_provider: GenerationProvider,
    /// Optional override for the text-generation endpoint.
    pub generation_url: Option<String>,
    /// Optional bearer token for the text-generation endpoint.
    pub generation_api_key: Option<String>,
    /// Model summarizing text blocks and tables.
    pub summary_model: String,
    /// Vision-capable model describing images.
    pub vision_model: String,
    /// Model synthesizing answers from retrieved originals.
    pub answer_model: String,
    /// Document partitioning backend.
    pub extractor_provider: ExtractorProvider,
    /// Base URL of the Unstructured partition API.
    pub unstructured_url: String,
    /// Optional API key for the Unstructured partition API.
    pub unstructured_api_key: Option<String>,
    /// Root directory of the persisted session store.
    pub data_dir: PathBuf,
    /// Persist original artifacts so rehydrated sessions can resolve payloads.
    pub persist_content_store: bool,
    /// Default number of originals retrieved per question.
    pub retrieval_top_k: usize,
    /// Maximum in-flight summarization calls.
    pub summary_concurrency: usize,
    /// Maximum exchanges retained per session log.
    pub history_max_exchanges: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported vector index backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Qdrant over its REST API.
    Qdrant,
    /// Process-local brute-force index (lost on restart).
    Memory,
}

/// Supported embedding backends for the indexing pipeline.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic feature-hashing embeddings that need no external service.
    Hash,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI-compatible chat completions API (OpenAI, Groq, Gemini compatibility layer).
    OpenAI,
}

/// Supported document partitioning backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorProvider {
    /// Unstructured partition API (text, tables, images).
    Unstructured,
    /// In-process text-only extraction.
    Local,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vector_store = parse_or("VECTOR_STORE", VectorStoreKind::Qdrant)?;
        let qdrant_url = load_env_optional("QDRANT_URL");
        if vector_store == VectorStoreKind::Qdrant && qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
        }

        let embedding_dimension = parse_or("EMBEDDING_DIMENSION", 384usize)?;
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        let summary_concurrency = parse_or("SUMMARY_CONCURRENCY", 3usize)?;
        if summary_concurrency == 0 {
            return Err(ConfigError::InvalidValue("SUMMARY_CONCURRENCY".into()));
        }
        let retrieval_top_k = parse_or("RETRIEVAL_TOP_K", 4usize)?;
        if retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }

        Ok(Self {
            vector_store,
            qdrant_url,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Ollama)?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "all-minilm"),
            embedding_dimension,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            generation_provider: parse_or("GENERATION_PROVIDER", GenerationProvider::Ollama)?,
            generation_url: load_env_optional("GENERATION_URL"),
            generation_api_key: load_env_optional("GENERATION_API_KEY"),
            summary_model: load_env_or("SUMMARY_MODEL", "llama3.2"),
            vision_model: load_env_or("VISION_MODEL", "llava"),
            answer_model: load_env_or("ANSWER_MODEL", "llama3.2"),
            extractor_provider: parse_or("EXTRACTOR_PROVIDER", ExtractorProvider::Unstructured)?,
            unstructured_url: load_env_or("UNSTRUCTURED_URL", "http://127.0.0.1:8000"),
            unstructured_api_key: load_env_optional("UNSTRUCTURED_API_KEY"),
            data_dir: PathBuf::from(load_env_or("DATA_DIR", "./rag_data")),
            persist_content_store: parse_bool_or("PERSIST_CONTENT_STORE", true)?,
            retrieval_top_k,
            summary_concurrency,
            history_max_exchanges: parse_or("HISTORY_MAX_EXCHANGES", 20usize)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn parse_bool_or(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl std::str::FromStr for VectorStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for ExtractorProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unstructured" => Ok(Self::Unstructured),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_store = ?config.vector_store,
        qdrant_url = ?config.qdrant_url,
        embedding_provider = ?config.embedding_provider,
        generation_provider = ?config.generation_provider,
        extractor_provider = ?config.extractor_provider,
        data_dir = %config.data_dir.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!("Ollama".parse(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("HASH".parse(), Ok(EmbeddingProvider::Hash));
        assert_eq!("openai".parse(), Ok(GenerationProvider::OpenAI));
        assert_eq!("memory".parse(), Ok(VectorStoreKind::Memory));
        assert_eq!("Local".parse(), Ok(ExtractorProvider::Local));
        assert!("chroma".parse::<VectorStoreKind>().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}

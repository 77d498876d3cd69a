//! Artifact extraction: partition a document into raw elements, then chunk them into text
//! blocks, tables, and images in document order.
//!
//! Layout parsing and OCR live behind [`DocumentPartitioner`]. The crate ships an adapter for
//! the Unstructured partition API and a local text-only adapter; chunking is done here so both
//! honor the same `ExtractionConfig` knobs.

pub mod chunking;
pub mod local;
pub mod unstructured;

use crate::artifact::{Artifact, ImageData};
use crate::config::{Config, ExtractorProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use chunking::{ChunkingOptions, chunk_elements};
pub use local::LocalPdfPartitioner;
pub use unstructured::UnstructuredPartitioner;

/// Errors raised while partitioning a document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The request configuration cannot be honored.
    #[error("Invalid extraction configuration: {0}")]
    InvalidConfig(String),
    /// The partitioning service could not be reached or rejected the request.
    #[error("Partitioner request failed: {0}")]
    Partitioner(String),
    /// The partitioner response could not be interpreted.
    #[error("Malformed partitioner response: {0}")]
    InvalidResponse(String),
    /// The document itself could not be parsed.
    #[error("Failed to parse document: {0}")]
    Document(String),
}

/// Layout analysis strategy requested from the partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Model-based layout detection; required for tables and images.
    HiRes,
    /// Text-layer extraction only.
    Fast,
    /// OCR every page.
    OcrOnly,
}

impl Strategy {
    /// Wire name understood by the partitioner.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HiRes => "hi_res",
            Self::Fast => "fast",
            Self::OcrOnly => "ocr_only",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hi_res" => Ok(Self::HiRes),
            "fast" => Ok(Self::Fast),
            "ocr_only" => Ok(Self::OcrOnly),
            other => Err(ExtractionError::InvalidConfig(format!(
                "unknown strategy '{other}'"
            ))),
        }
    }
}

/// How raw elements are grouped into text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Titles start new sections; small sections are combined.
    ByTitle,
    /// Sequential filling by size only.
    Default,
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "by_title" => Ok(Self::ByTitle),
            "default" | "basic" => Ok(Self::Default),
            other => Err(ExtractionError::InvalidConfig(format!(
                "unknown chunking strategy '{other}'"
            ))),
        }
    }
}

/// Per-request extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Render tables as HTML.
    pub infer_table_structure: bool,
    /// Layout analysis strategy.
    pub strategy: Strategy,
    /// Text grouping strategy.
    pub chunking_strategy: ChunkingStrategy,
    /// Hard upper bound on a text block's length in characters.
    pub max_characters: usize,
    /// Sections shorter than this are merged with their neighbor.
    pub combine_text_under_n_chars: usize,
    /// Soft bound after which a new text block is started.
    pub new_after_n_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            infer_table_structure: true,
            strategy: Strategy::HiRes,
            chunking_strategy: ChunkingStrategy::ByTitle,
            max_characters: 10_000,
            combine_text_under_n_chars: 2_000,
            new_after_n_chars: 6_000,
        }
    }
}

impl ExtractionConfig {
    /// Validate and derive the chunking bounds. Soft bounds above the hard bound are clamped.
    pub fn chunking_options(&self) -> Result<ChunkingOptions, ExtractionError> {
        if self.max_characters == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_characters must be greater than zero".into(),
            ));
        }
        Ok(ChunkingOptions {
            by_title: self.chunking_strategy == ChunkingStrategy::ByTitle,
            max_characters: self.max_characters,
            new_after_n_chars: self.new_after_n_chars.clamp(1, self.max_characters),
            combine_text_under_n_chars: self.combine_text_under_n_chars.min(self.max_characters),
        })
    }
}

/// Category assigned to a raw element by the partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCategory {
    /// Section heading.
    Title,
    /// Any other textual element (narrative text, list items, captions).
    Text,
    /// Table.
    Table,
    /// Figure or picture.
    Image,
}

/// Element emitted by a partitioner before chunking.
#[derive(Debug, Clone)]
pub struct RawElement {
    /// Element category.
    pub category: ElementCategory,
    /// Plain text content.
    pub text: String,
    /// HTML rendering for tables, when available.
    pub html: Option<String>,
    /// Image bytes for image elements.
    pub image: Option<ImageData>,
    /// 1-based page number, when known.
    pub page_number: Option<u32>,
}

impl RawElement {
    /// Textual element helper.
    pub fn text(category: ElementCategory, text: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            category,
            text: text.into(),
            html: None,
            image: None,
            page_number: page,
        }
    }
}

/// Position of an extracted artifact within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPosition {
    /// Zero-based order in the extracted sequence.
    pub index: usize,
    /// Page the artifact starts on, when known.
    pub page_number: Option<u32>,
}

/// Chunked artifact with its original position.
#[derive(Debug, Clone)]
pub struct ContentElement {
    /// Extracted content.
    pub artifact: Artifact,
    /// Where the content sits in the document.
    pub position: ElementPosition,
}

/// External document-partitioning capability.
#[async_trait]
pub trait DocumentPartitioner: Send + Sync {
    /// Split a document into ordered raw elements.
    async fn partition(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<Vec<RawElement>, ExtractionError>;
}

/// Build the partitioner selected by configuration.
pub fn get_partitioner(config: &Config) -> Result<Arc<dyn DocumentPartitioner>, ExtractionError> {
    let partitioner: Arc<dyn DocumentPartitioner> = match config.extractor_provider {
        ExtractorProvider::Unstructured => Arc::new(UnstructuredPartitioner::new(
            config.unstructured_url.clone(),
            config.unstructured_api_key.clone(),
        )?),
        ExtractorProvider::Local => Arc::new(LocalPdfPartitioner),
    };
    Ok(partitioner)
}

/// Artifact Extractor: partitions a document and chunks the result.
pub struct ArtifactExtractor {
    partitioner: Arc<dyn DocumentPartitioner>,
}

impl ArtifactExtractor {
    /// Wrap a partitioner.
    pub fn new(partitioner: Arc<dyn DocumentPartitioner>) -> Self {
        Self { partitioner }
    }

    /// Build the extractor selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self, ExtractionError> {
        Ok(Self::new(get_partitioner(config)?))
    }

    /// Extract ordered text, table, and image artifacts from document bytes.
    pub async fn extract(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<Vec<ContentElement>, ExtractionError> {
        let options = config.chunking_options()?;
        if document.is_empty() {
            return Err(ExtractionError::Document("document is empty".into()));
        }
        let raw = self.partitioner.partition(document, config).await?;
        let raw_count = raw.len();
        let elements = chunk_elements(raw, config.infer_table_structure, &options);
        tracing::debug!(
            raw_elements = raw_count,
            artifacts = elements.len(),
            strategy = config.strategy.as_str(),
            "Document partitioned"
        );
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [Strategy::HiRes, Strategy::Fast, Strategy::OcrOnly] {
            assert_eq!(strategy.as_str().parse::<Strategy>().ok(), Some(strategy));
        }
        assert!("precise".parse::<Strategy>().is_err());
    }

    #[test]
    fn chunking_options_clamp_soft_bounds() {
        let config = ExtractionConfig {
            max_characters: 100,
            new_after_n_chars: 500,
            combine_text_under_n_chars: 400,
            ..Default::default()
        };
        let options = config.chunking_options().expect("options");
        assert_eq!(options.new_after_n_chars, 100);
        assert_eq!(options.combine_text_under_n_chars, 100);
        assert!(options.by_title);
    }

    #[test]
    fn zero_max_characters_is_rejected() {
        let config = ExtractionConfig {
            max_characters: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.chunking_options(),
            Err(ExtractionError::InvalidConfig(_))
        ));
    }

    struct FailingPartitioner;

    #[async_trait]
    impl DocumentPartitioner for FailingPartitioner {
        async fn partition(
            &self,
            _document: &[u8],
            _config: &ExtractionConfig,
        ) -> Result<Vec<RawElement>, ExtractionError> {
            Err(ExtractionError::Partitioner("service down".into()))
        }
    }

    #[tokio::test]
    async fn partitioner_failures_propagate() {
        let extractor = ArtifactExtractor::new(Arc::new(FailingPartitioner));
        let error = extractor
            .extract(b"%PDF-1.7", &ExtractionConfig::default())
            .await
            .expect_err("failure");
        assert!(error.to_string().contains("service down"));
    }
}

//! Document processing: collection naming, summarization, and the ingestion pipeline.

pub mod sanitize;
mod service;
mod summarize;

pub use sanitize::sanitize_collection_name;
pub use service::{IngestError, IngestOutcome, IngestionService};
pub use summarize::{
    IMAGE_DESCRIPTION_TEMPERATURE, ImageDescriptions, SUMMARY_TEMPERATURE, Summarizer,
};

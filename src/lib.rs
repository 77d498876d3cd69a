#![deny(missing_docs)]

//! Core library for Rusty RAG: question answering over a single PDF.
//!
//! Extracted text blocks, tables, and images are summarized, the summaries are embedded into a
//! per-session vector collection, and the originals are kept in a content store keyed by the
//! same `doc_id`. Questions are answered from the originals whose summaries match best.

/// HTTP routing and REST handlers.
pub mod api;
/// Artifact model shared across the pipeline.
pub mod artifact;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document partitioning and chunking.
pub mod extraction;
/// Text-generation client abstraction and adapters.
pub mod generation;
/// Dual-store index over summaries and originals.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Summarization and ingestion pipeline.
pub mod processing;
/// Question answering over a session.
pub mod qa;
/// Qdrant vector store integration.
pub mod qdrant;
/// Service facade shared by the HTTP and CLI surfaces.
pub mod service;
/// Session persistence and registry.
pub mod session;
/// RFC 3339 timestamps.
pub mod timestamp;

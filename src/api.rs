//! HTTP surface for Rusty RAG.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload_pdf` – Multipart upload of a PDF (`file`) plus optional extraction fields
//!   (`infer_table_structure`, `strategy`, `chunking_strategy`, `max_characters`,
//!   `combine_text_under_n_chars`, `new_after_n_chars`). Returns the new `session_id`.
//! - `POST /ask_question` – Form fields `session_id` and `question`. Returns the answer, the
//!   grounding text (`source_documents`), and at most one base64 image (`relevant_images`).
//! - `GET /sessions` – Persisted sessions, newest first.
//! - `GET /sessions/:id/history` – Question/answer exchanges recorded for a session.
//! - `GET /metrics` – Ingestion and question counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::config::parse_bool;
use crate::extraction::{ExtractionConfig, ExtractionError};
use crate::index::ContentState;
use crate::metrics::MetricsSnapshot;
use crate::processing::IngestError;
use crate::qa::QaError;
use crate::service::RagApi;
use crate::session::{ArtifactCounts, Exchange, SessionRecord};
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the ingestion and question-answering surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/upload_pdf", post(upload_pdf::<S>))
        .route("/ask_question", post(ask_question::<S>))
        .route("/sessions", get(list_sessions::<S>))
        .route("/sessions/:session_id/history", get(session_history::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Success response for `POST /upload_pdf`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    session_id: String,
    collection_name: String,
    counts: ArtifactCounts,
}

/// Ingest an uploaded PDF into a new session.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let (document, config) = read_upload(multipart).await?;
    let outcome = service.ingest(document, config).await?;
    tracing::info!(
        session_id = outcome.session_id,
        texts = outcome.counts.texts,
        tables = outcome.counts.tables,
        images = outcome.counts.images,
        "Upload processed"
    );
    Ok(Json(UploadResponse {
        message: "File processed successfully.",
        session_id: outcome.session_id,
        collection_name: outcome.collection_name,
        counts: outcome.counts,
    }))
}

async fn read_upload(mut multipart: Multipart) -> Result<(Vec<u8>, ExtractionConfig), AppError> {
    let mut document = None;
    let mut config = ExtractionConfig::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            document = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            continue;
        }
        let value = field.text().await.map_err(multipart_error)?;
        apply_form_field(&mut config, &name, &value)?;
    }
    let document =
        document.ok_or_else(|| AppError::BadRequest("missing multipart field 'file'".into()))?;
    Ok((document, config))
}

fn apply_form_field(config: &mut ExtractionConfig, name: &str, value: &str) -> Result<(), AppError> {
    let invalid = || AppError::BadRequest(format!("invalid value for '{name}': {value}"));
    match name {
        "infer_table_structure" => {
            config.infer_table_structure = parse_bool(value).ok_or_else(invalid)?;
        }
        "strategy" => config.strategy = value.parse().map_err(AppError::from)?,
        "chunking_strategy" => config.chunking_strategy = value.parse().map_err(AppError::from)?,
        "max_characters" => config.max_characters = value.trim().parse().map_err(|_| invalid())?,
        "combine_text_under_n_chars" => {
            config.combine_text_under_n_chars = value.trim().parse().map_err(|_| invalid())?;
        }
        "new_after_n_chars" => {
            config.new_after_n_chars = value.trim().parse().map_err(|_| invalid())?;
        }
        other => tracing::debug!(field = other, "Ignoring unknown upload field"),
    }
    Ok(())
}

fn multipart_error(error: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed multipart body: {error}"))
}

/// Form body for `POST /ask_question`.
#[derive(Deserialize)]
struct AskRequest {
    session_id: String,
    question: String,
}

/// Success response for `POST /ask_question`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    source_documents: Vec<String>,
    relevant_images: Vec<String>,
    content_state: ContentState,
}

/// Answer a question against an existing session.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Form(request): Form<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: RagApi,
{
    let answer = service.ask(&request.session_id, &request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.answer,
        source_documents: answer.grounding_text,
        relevant_images: answer
            .grounding_images
            .iter()
            .take(1)
            .map(|image| image.to_base64())
            .collect(),
        content_state: answer.content_state,
    }))
}

/// Response body for `GET /sessions`.
#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<SessionRecord>,
}

/// List persisted sessions.
async fn list_sessions<S>(State(service): State<Arc<S>>) -> Result<Json<SessionsResponse>, AppError>
where
    S: RagApi,
{
    let sessions = service
        .sessions()
        .await
        .map_err(|error| AppError::Internal(error.to_string()))?;
    Ok(Json(SessionsResponse { sessions }))
}

/// Response body for `GET /sessions/:id/history`.
#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    exchanges: Vec<Exchange>,
}

/// Return the exchanges recorded for a session.
async fn session_history<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError>
where
    S: RagApi,
{
    let exchanges = service.history(&session_id).await?;
    Ok(Json(HistoryResponse {
        session_id,
        exchanges,
    }))
}

/// Return a snapshot of the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_pdf",
                method: "POST",
                path: "/upload_pdf",
                description: "Upload a PDF as multipart field 'file'; text, tables, and images are summarized and indexed into a new session. Returns { \"session_id\": string }.",
                request_example: Some(json!({
                    "file": "<pdf bytes>",
                    "infer_table_structure": true,
                    "strategy": "hi_res",
                    "chunking_strategy": "by_title",
                    "max_characters": 10000,
                    "combine_text_under_n_chars": 2000,
                    "new_after_n_chars": 6000
                })),
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/ask_question",
                description: "Answer a question from a session's document. Returns { \"answer\", \"source_documents\", \"relevant_images\" }.",
                request_example: Some(json!({
                    "session_id": "3f2a9c...",
                    "question": "What is the capital of France?"
                })),
            },
            CommandDescriptor {
                name: "list_sessions",
                method: "GET",
                path: "/sessions",
                description: "Return persisted sessions, newest first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "session_history",
                method: "GET",
                path: "/sessions/:session_id/history",
                description: "Return the question/answer exchanges recorded for a session.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and question counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ExtractionError> for AppError {
    fn from(inner: ExtractionError) -> Self {
        Self::BadRequest(inner.to_string())
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        match inner {
            IngestError::Extraction(ExtractionError::InvalidConfig(_)) => {
                Self::BadRequest(inner.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<QaError> for AppError {
    fn from(inner: QaError) -> Self {
        match inner {
            QaError::SessionNotFound(_) => Self::NotFound(inner.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

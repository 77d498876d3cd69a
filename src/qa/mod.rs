//! QA Orchestrator: retrieve originals, ground a prompt in them, and generate the answer.

mod association;
mod prompt;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::artifact::{Artifact, ImageData};
use crate::generation::{GenerationError, GenerationRequest, TextGenerationClient};
use crate::index::{ContentState, DualStoreIndex, IndexError, SessionIndex};
use crate::metrics::PipelineMetrics;
use crate::timestamp::now_rfc3339;
use crate::session::{Exchange, SessionRegistry, SessionStore};

pub use association::extract_entity_name;
pub use prompt::build_answer_prompt;

/// Sampling temperature for answer synthesis.
pub const ANSWER_TEMPERATURE: f32 = 0.0;

/// Errors surfaced to callers asking questions.
#[derive(Debug, Error)]
pub enum QaError {
    /// No active handle and no persisted record for the session.
    #[error("Invalid session_id or session expired")]
    SessionNotFound(String),
    /// Similarity search failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] IndexError),
    /// The image association fallback failed.
    #[error("Image association failed: {0}")]
    Association(#[source] IndexError),
    /// Answer generation failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Answer plus the originals it is grounded in.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer text.
    pub answer: String,
    /// Text and table payloads passed to the model, best match first.
    pub grounding_text: Vec<String>,
    /// Zero or one image relevant to the question.
    pub grounding_images: Vec<ImageData>,
    /// How much original content the session could resolve.
    pub content_state: ContentState,
}

/// Answers questions against one session at a time.
pub struct QaService {
    index: Arc<DualStoreIndex>,
    store: SessionStore,
    registry: Arc<SessionRegistry>,
    generator: Arc<dyn TextGenerationClient>,
    answer_model: String,
    top_k: usize,
    metrics: Arc<PipelineMetrics>,
}

impl QaService {
    /// Assemble the orchestrator from its collaborators.
    pub fn new(
        index: Arc<DualStoreIndex>,
        store: SessionStore,
        registry: Arc<SessionRegistry>,
        generator: Arc<dyn TextGenerationClient>,
        answer_model: impl Into<String>,
        top_k: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            index,
            store,
            registry,
            generator,
            answer_model: answer_model.into(),
            top_k: top_k.max(1),
            metrics,
        }
    }

    /// Answer `question` from the session's indexed content.
    ///
    /// Any failure is returned as a single error; no partial answer is produced.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer, QaError> {
        let result = self.answer(session_id, question).await;
        match &result {
            Ok(_) => self.metrics.record_question(),
            Err(error) => {
                self.metrics.record_question_failure();
                tracing::warn!(session_id, %error, "Question failed");
            }
        }
        result
    }

    /// Exchanges recorded for the session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Exchange>, QaError> {
        Ok(self.resolve(session_id).await?.history())
    }

    async fn answer(&self, session_id: &str, question: &str) -> Result<Answer, QaError> {
        let session = self.resolve(session_id).await?;

        let retrieved = self
            .index
            .retrieve(&session, question, self.top_k)
            .await
            .map_err(QaError::Retrieval)?;

        let mut grounding_text = Vec::new();
        let mut image = None;
        for item in retrieved {
            match item.artifact {
                Artifact::Text(text) | Artifact::Table(text) => grounding_text.push(text),
                Artifact::Image(data) => {
                    image.get_or_insert(data);
                }
            }
        }

        if image.is_none() {
            image = association::associate_image(&self.index, &session, question)
                .await
                .map_err(QaError::Association)?;
        }

        let prompt = build_answer_prompt(&grounding_text, question);
        let answer = self
            .generator
            .generate(GenerationRequest {
                model: self.answer_model.clone(),
                prompt,
                image: None,
                temperature: ANSWER_TEMPERATURE,
            })
            .await?
            .trim()
            .to_string();

        session.record_exchange(Exchange {
            question: question.to_string(),
            answer: answer.clone(),
            answered_at: now_rfc3339(),
        });
        tracing::info!(
            session_id,
            grounding = grounding_text.len(),
            image = image.is_some(),
            "Question answered"
        );

        Ok(Answer {
            answer,
            grounding_text,
            grounding_images: image.into_iter().collect(),
            content_state: session.content_state(),
        })
    }

    async fn resolve(&self, session_id: &str) -> Result<Arc<SessionIndex>, QaError> {
        self.registry
            .get_or_rehydrate(session_id, &self.index, &self.store)
            .await
            .map_err(|error| {
                tracing::debug!(session_id, %error, "Session could not be resolved");
                QaError::SessionNotFound(session_id.to_string())
            })
    }
}

//! Text-generation capability used for artifact summaries, image descriptions, and answers.
//!
//! Both adapters issue HTTP requests directly: Ollama's `/api/generate` (images inlined through
//! the `images` field) and OpenAI-compatible chat completions (images inlined as `data:` URLs),
//! which also covers Groq and Gemini's compatibility endpoint.

use crate::artifact::ImageData;
use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced while calling the text-generation provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the text-generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully assembled prompt text.
    pub prompt: String,
    /// Optional image inlined alongside the prompt.
    pub image: Option<ImageData>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    /// Generate text for a single prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Build a text-generation client based on configuration.
pub fn get_generation_client(
    config: &Config,
) -> Result<Arc<dyn TextGenerationClient>, GenerationError> {
    let http = Client::builder()
        .user_agent("rusty-rag/generation")
        .build()
        .map_err(|error| GenerationError::ProviderUnavailable(error.to_string()))?;
    let client: Arc<dyn TextGenerationClient> = match config.generation_provider {
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient {
            http,
            base_url: config
                .generation_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        }),
        GenerationProvider::OpenAI => Arc::new(OpenAiGenerationClient {
            http,
            base_url: config
                .generation_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: config.generation_api_key.clone(),
        }),
    };
    Ok(client)
}

struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl TextGenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": request.temperature },
        });
        if let (Some(image), Some(object)) = (request.image.as_ref(), payload.as_object_mut()) {
            object.insert("images".into(), json!([image.to_base64()]));
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_content(request: &GenerationRequest) -> Value {
    match request.image.as_ref() {
        None => Value::String(request.prompt.clone()),
        Some(image) => json!([
            { "type": "text", "text": request.prompt },
            { "type": "image_url", "image_url": { "url": image.to_data_url() } },
        ]),
    }
}

#[async_trait]
impl TextGenerationClient for OpenAiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let payload = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": chat_content(&request) }],
        });

        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut builder = self.http.post(&endpoint).json(&payload);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|error| {
            GenerationError::ProviderUnavailable(format!("failed to reach {endpoint}: {error}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::GenerationFailed(format!(
                "{endpoint} returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| GenerationError::InvalidResponse("completion had no content".into()))
    }
}

//! Summarizer: language-model summaries that stand in for artifacts during similarity search.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::artifact::{Artifact, ImageData, SummarizedArtifact};
use crate::generation::{GenerationError, GenerationRequest, TextGenerationClient};

/// Sampling temperature for text and table summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.5;
/// Sampling temperature for image descriptions.
pub const IMAGE_DESCRIPTION_TEMPERATURE: f32 = 0.0;

const SUMMARY_PROMPT: &str = "You are an assistant tasked with summarizing tables and text.\n\
Give a concise summary of the table or text.\n\
Respond only with the summary.\n\
Table or text chunk: ";

const IMAGE_PROMPT: &str = "Describe the image in detail. For context, the image is part of a \
technical or scientific document. Be specific about graphs such as bar plots, about axes, \
labels and trends, and about any architecture or flow diagram shown.";

/// Images that were described, plus the count of images skipped after a failed call.
#[derive(Debug, Default)]
pub struct ImageDescriptions {
    /// Described images, in input order.
    pub described: Vec<SummarizedArtifact>,
    /// Number of images whose description failed.
    pub skipped: usize,
}

/// Summarizes text/table artifacts and describes images through a [`TextGenerationClient`].
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn TextGenerationClient>,
    summary_model: String,
    vision_model: String,
    concurrency: usize,
}

impl Summarizer {
    /// Build a summarizer allowing `concurrency` in-flight text/table calls.
    pub fn new(
        client: Arc<dyn TextGenerationClient>,
        summary_model: impl Into<String>,
        vision_model: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            summary_model: summary_model.into(),
            vision_model: vision_model.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Summarize one text block or table rendering.
    pub async fn summarize_text_or_table(&self, content: &str) -> Result<String, GenerationError> {
        let summary = self
            .client
            .generate(GenerationRequest {
                model: self.summary_model.clone(),
                prompt: format!("{SUMMARY_PROMPT}{content}"),
                image: None,
                temperature: SUMMARY_TEMPERATURE,
            })
            .await?;
        Ok(summary.trim().to_string())
    }

    /// Summarize a batch of text or table artifacts, preserving input order.
    ///
    /// At most `concurrency` calls are in flight. The first failure aborts the batch and no
    /// summaries are returned.
    pub async fn summarize_batch(
        &self,
        artifacts: Vec<Artifact>,
    ) -> Result<Vec<SummarizedArtifact>, GenerationError> {
        stream::iter(artifacts)
            .map(|artifact| async move {
                let content = artifact.as_text().unwrap_or_default();
                let summary = self.summarize_text_or_table(content).await?;
                Ok::<_, GenerationError>(SummarizedArtifact { artifact, summary })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    /// Describe one image with the vision model.
    pub async fn describe_image(&self, image: &ImageData) -> Result<String, GenerationError> {
        let description = self
            .client
            .generate(GenerationRequest {
                model: self.vision_model.clone(),
                prompt: IMAGE_PROMPT.to_string(),
                image: Some(image.clone()),
                temperature: IMAGE_DESCRIPTION_TEMPERATURE,
            })
            .await?;
        Ok(description.trim().to_string())
    }

    /// Describe images one at a time; failed images are logged and skipped.
    pub async fn describe_images(&self, images: &[ImageData]) -> ImageDescriptions {
        let mut result = ImageDescriptions::default();
        for (position, image) in images.iter().enumerate() {
            match self.describe_image(image).await {
                Ok(summary) => result.described.push(SummarizedArtifact {
                    artifact: Artifact::Image(image.clone()),
                    summary,
                }),
                Err(error) => {
                    result.skipped += 1;
                    tracing::warn!(
                        position,
                        bytes = image.len(),
                        %error,
                        "Image description failed; skipping image"
                    );
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        requests: Mutex<Vec<GenerationRequest>>,
        fail_when_contains: Option<&'static str>,
    }

    #[async_trait]
    impl TextGenerationClient for RecordingClient {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failing = self
                .fail_when_contains
                .is_some_and(|needle| request.prompt.contains(needle))
                || request
                    .image
                    .as_ref()
                    .is_some_and(|image| image.as_bytes() == b"bad");
            let reply = format!("summary of {}", request.prompt.rsplit(": ").next().unwrap_or(""));
            self.requests.lock().expect("lock").push(request);
            if failing {
                Err(GenerationError::GenerationFailed("scripted failure".into()))
            } else {
                Ok(format!("  {reply}  "))
            }
        }
    }

    #[tokio::test]
    async fn batch_preserves_order_and_caps_concurrency() {
        let client = Arc::new(RecordingClient::default());
        let summarizer = Summarizer::new(client.clone(), "sum", "vis", 3);
        let artifacts: Vec<_> = (0..8).map(|n| Artifact::Text(format!("chunk {n}"))).collect();

        let summaries = summarizer.summarize_batch(artifacts).await.expect("batch");
        assert_eq!(summaries.len(), 8);
        assert_eq!(summaries[5].summary, "summary of chunk 5");
        assert_eq!(summaries[5].artifact, Artifact::Text("chunk 5".into()));
        assert!(client.peak.load(Ordering::SeqCst) <= 3);

        let requests = client.requests.lock().expect("lock");
        assert!(requests.iter().all(|r| r.temperature == SUMMARY_TEMPERATURE));
        assert!(requests.iter().all(|r| r.model == "sum" && r.image.is_none()));
    }

    #[tokio::test]
    async fn batch_failure_is_all_or_nothing() {
        let client = Arc::new(RecordingClient {
            fail_when_contains: Some("<table>"),
            ..Default::default()
        });
        let summarizer = Summarizer::new(client, "sum", "vis", 3);
        let result = summarizer
            .summarize_batch(vec![
                Artifact::Table("<tr>ok</tr>".into()),
                Artifact::Table("<table>bad</table>".into()),
            ])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn image_failures_are_skipped() {
        let client = Arc::new(RecordingClient::default());
        let summarizer = Summarizer::new(client.clone(), "sum", "vis", 3);
        let images = vec![
            ImageData::new(b"one".to_vec()),
            ImageData::new(b"bad".to_vec()),
            ImageData::new(b"three".to_vec()),
        ];

        let result = summarizer.describe_images(&images).await;
        assert_eq!(result.described.len(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.described[1].artifact, Artifact::Image(images[2].clone()));

        let requests = client.requests.lock().expect("lock");
        assert!(requests.iter().all(|r| r.model == "vis"));
        assert!(requests
            .iter()
            .all(|r| r.temperature == IMAGE_DESCRIPTION_TEMPERATURE));
    }
}

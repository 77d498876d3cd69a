//! Adapter for the Unstructured partition API (`/general/v0/general`).

use super::{
    DocumentPartitioner, ElementCategory, ExtractionConfig, ExtractionError, RawElement,
};
use crate::artifact::ImageData;
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

const PARTITION_PATH: &str = "general/v0/general";

/// HTTP client for a hosted or self-hosted Unstructured API.
pub struct UnstructuredPartitioner {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiElement {
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: ApiMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMetadata {
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    text_as_html: Option<String>,
    #[serde(default)]
    image_base64: Option<String>,
}

impl UnstructuredPartitioner {
    /// Construct a client for the API at `base_url`.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ExtractionError> {
        let http = Client::builder()
            .user_agent("rusty-rag/extraction")
            .build()
            .map_err(|error| ExtractionError::Partitioner(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{PARTITION_PATH}", self.base_url.trim_end_matches('/'))
    }

    fn form(document: &[u8], config: &ExtractionConfig) -> Result<Form, ExtractionError> {
        let file = Part::bytes(document.to_vec())
            .file_name("document.pdf")
            .mime_str("application/pdf")
            .map_err(|error| ExtractionError::Partitioner(error.to_string()))?;
        Ok(Form::new()
            .part("files", file)
            .text("strategy", config.strategy.as_str())
            .text(
                "pdf_infer_table_structure",
                config.infer_table_structure.to_string(),
            )
            .text("extract_image_block_types", r#"["Image"]"#))
    }
}

fn map_element(element: ApiElement) -> Option<RawElement> {
    let ApiElement {
        element_type,
        text,
        metadata,
    } = element;
    let page_number = metadata.page_number;

    match element_type.as_str() {
        "PageBreak" => None,
        "Title" => Some(RawElement::text(ElementCategory::Title, text, page_number)),
        "Table" => Some(RawElement {
            category: ElementCategory::Table,
            text,
            html: metadata.text_as_html,
            image: None,
            page_number,
        }),
        "Image" => {
            let image = match metadata.image_base64.as_deref().map(ImageData::from_base64) {
                Some(Ok(image)) => Some(image),
                Some(Err(error)) => {
                    tracing::warn!(page = ?page_number, error = %error, "Discarding undecodable image payload");
                    None
                }
                None => None,
            };
            Some(RawElement {
                category: ElementCategory::Image,
                text,
                html: None,
                image,
                page_number,
            })
        }
        _ => Some(RawElement::text(ElementCategory::Text, text, page_number)),
    }
}

#[async_trait]
impl DocumentPartitioner for UnstructuredPartitioner {
    async fn partition(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<Vec<RawElement>, ExtractionError> {
        let mut request = self
            .http
            .post(self.endpoint())
            .header("accept", "application/json")
            .multipart(Self::form(document, config)?);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("unstructured-api-key", key);
        }

        let response = request.send().await.map_err(|error| {
            ExtractionError::Partitioner(format!(
                "failed to reach Unstructured at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Partitioner(format!(
                "Unstructured returned {status}: {body}"
            )));
        }

        let elements: Vec<ApiElement> = response
            .json()
            .await
            .map_err(|error| ExtractionError::InvalidResponse(error.to_string()))?;
        tracing::debug!(elements = elements.len(), "Unstructured partition completed");
        Ok(elements.into_iter().filter_map(map_element).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn partition_maps_element_types() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/general/v0/general")
                    .header("unstructured-api-key", "key")
                    .body_contains("hi_res");
                then.status(200).json_body(json!([
                    { "type": "Title", "text": "Results", "metadata": { "page_number": 1 } },
                    { "type": "NarrativeText", "text": "Accuracy rose.", "metadata": { "page_number": 1 } },
                    { "type": "PageBreak", "text": "" },
                    { "type": "Table", "text": "a b", "metadata": { "page_number": 2, "text_as_html": "<table/>" } },
                    { "type": "Image", "text": "", "metadata": { "page_number": 3, "image_base64": "AQID" } }
                ]));
            })
            .await;

        let partitioner =
            UnstructuredPartitioner::new(server.base_url(), Some("key".into())).expect("client");
        let elements = partitioner
            .partition(b"%PDF-1.7", &ExtractionConfig::default())
            .await
            .expect("elements");

        mock.assert();
        let categories: Vec<_> = elements.iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![
                ElementCategory::Title,
                ElementCategory::Text,
                ElementCategory::Table,
                ElementCategory::Image
            ]
        );
        assert_eq!(elements[2].html.as_deref(), Some("<table/>"));
        assert_eq!(
            elements[3].image.as_ref().map(|image| image.as_bytes().to_vec()),
            Some(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn partition_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/general/v0/general");
                then.status(422).body("bad pdf");
            })
            .await;

        let partitioner = UnstructuredPartitioner::new(server.base_url(), None).expect("client");
        let error = partitioner
            .partition(b"junk", &ExtractionConfig::default())
            .await
            .expect_err("error");
        assert!(matches!(error, ExtractionError::Partitioner(ref message) if message.contains("422")));
    }
}

//! In-process, text-only partitioner backed by `pdf-extract`.
//!
//! Tables and images need layout analysis and are not produced here; paragraphs become text
//! elements and short unpunctuated single-line paragraphs are treated as titles.

use super::{
    DocumentPartitioner, ElementCategory, ExtractionConfig, ExtractionError, RawElement, Strategy,
};
use async_trait::async_trait;

const MAX_TITLE_CHARS: usize = 80;

/// Text-layer partitioner for PDFs.
pub struct LocalPdfPartitioner;

#[async_trait]
impl DocumentPartitioner for LocalPdfPartitioner {
    async fn partition(
        &self,
        document: &[u8],
        config: &ExtractionConfig,
    ) -> Result<Vec<RawElement>, ExtractionError> {
        if config.strategy != Strategy::Fast {
            tracing::warn!(
                strategy = config.strategy.as_str(),
                "Local partitioner only reads the text layer; tables and images are not extracted"
            );
        }

        let bytes = document.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|error| ExtractionError::Document(error.to_string()))?
            .map_err(|error| ExtractionError::Document(error.to_string()))?;

        Ok(split_paragraphs(&text))
    }
}

/// Split extracted text into paragraph elements. Form feeds advance the page counter.
pub(crate) fn split_paragraphs(text: &str) -> Vec<RawElement> {
    let mut elements = Vec::new();

    for (page_index, page) in text.split('\x0c').enumerate() {
        let page_number = Some(page_index as u32 + 1);
        let mut paragraph: Vec<&str> = Vec::new();
        for line in page.lines().chain(std::iter::once("")) {
            let line = line.trim();
            if line.is_empty() {
                if !paragraph.is_empty() {
                    let category = if paragraph.len() == 1 && looks_like_title(paragraph[0]) {
                        ElementCategory::Title
                    } else {
                        ElementCategory::Text
                    };
                    elements.push(RawElement::text(category, paragraph.join(" "), page_number));
                    paragraph.clear();
                }
            } else {
                paragraph.push(line);
            }
        }
    }

    elements
}

fn looks_like_title(line: &str) -> bool {
    line.chars().count() <= MAX_TITLE_CHARS
        && !line.ends_with(['.', ',', ';', ':', '?', '!'])
        && line
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

//! Artifact model shared by extraction, summarization, indexing, and answering.
//!
//! Content kinds travel as an explicit tagged union from the partitioner onward, so no stage
//! ever has to guess whether a payload is an image by trying to decode it.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Kind of original content an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Composite text block.
    Text,
    /// Table rendered as HTML or structured text.
    Table,
    /// Raw image bytes.
    Image,
}

impl ArtifactKind {
    /// Lowercase label used in payloads and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "image" => Ok(Self::Image),
            _ => Err(()),
        }
    }
}

/// One retrievable unit of original document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Artifact {
    /// Extracted text block.
    Text(String),
    /// Table rendering (HTML when structure inference ran).
    Table(String),
    /// Image bytes.
    Image(ImageData),
}

impl Artifact {
    /// Kind tag of this artifact.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Text(_) => ArtifactKind::Text,
            Self::Table(_) => ArtifactKind::Table,
            Self::Image(_) => ArtifactKind::Image,
        }
    }

    /// Textual payload for text blocks and tables.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Table(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    /// Image payload, if this artifact is an image.
    pub fn as_image(&self) -> Option<&ImageData> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// An artifact paired with the summary that makes it searchable.
#[derive(Debug, Clone)]
pub struct SummarizedArtifact {
    /// Original content preserved verbatim for grounding.
    pub artifact: Artifact,
    /// Language-model authored proxy used for similarity search.
    pub summary: String,
}

/// Raw image bytes. Serialized as standard base64 at every boundary.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImageData(Vec<u8>);

impl ImageData {
    /// Wrap raw image bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode a standard base64 string, tolerating surrounding whitespace.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded.trim()).map(Self)
    }

    /// Encode the image as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of raw bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the image carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Best-effort MIME type from the leading magic bytes, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        let bytes = self.0.as_slice();
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            "image/png"
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            "image/gif"
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            "image/webp"
        } else {
            "image/jpeg"
        }
    }

    /// `data:` URL suitable for inlining into a multimodal prompt.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageData({} bytes)", self.0.len())
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_serializes_with_kind_tag() {
        let artifact = Artifact::Table("<table></table>".into());
        let value = serde_json::to_value(&artifact).expect("serialize");
        assert_eq!(value["kind"], "table");
        assert_eq!(value["payload"], "<table></table>");
    }

    #[test]
    fn image_payload_survives_json() {
        let artifact = Artifact::Image(ImageData::new(vec![0x89, b'P', b'N', b'G', 0, 1, 2]));
        let encoded = serde_json::to_string(&artifact).expect("serialize");
        let decoded: Artifact = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, artifact);
        assert_eq!(decoded.kind(), ArtifactKind::Image);
    }

    #[test]
    fn mime_type_sniffs_png_and_defaults_to_jpeg() {
        let png = ImageData::new(b"\x89PNG\r\n\x1a\nrest".to_vec());
        assert_eq!(png.mime_type(), "image/png");
        assert!(png.to_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(ImageData::new(vec![0xff, 0xd8, 0xff]).mime_type(), "image/jpeg");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(ImageData::from_base64("not base64!").is_err());
    }
}

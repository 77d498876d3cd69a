//! Durable session records on the local filesystem.
//!
//! Each session owns a directory under the data root:
//!
//! - `session.json`: the [`SessionRecord`] (session id → collection binding plus metadata).
//! - `images.json`: the raw image list as base64 strings, in document order.
//! - `content.json`: the content store (`doc_id` → artifact), when persistence is enabled.
//!   Images are stored as positions into `images.json` rather than repeated.
//!
//! `session.json` is written last, so a directory without it never names a usable session.
//! Files are written to a temporary sibling and renamed into place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::artifact::{Artifact, ImageData};
use crate::timestamp::now_rfc3339;

const RECORD_FILE: &str = "session.json";
const IMAGES_FILE: &str = "images.json";
const CONTENT_FILE: &str = "content.json";

/// Errors raised while reading or writing session files.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Identifier contains characters that cannot name a session directory.
    #[error("Invalid session id '{0}'")]
    InvalidSessionId(String),
    /// No record has been persisted for the session.
    #[error("Session '{0}' not found")]
    NotFound(String),
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// File contents could not be encoded or decoded.
    #[error("Unreadable session file {path}: {source}")]
    Serde {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Number of artifacts indexed per kind during ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCounts {
    /// Text blocks indexed.
    pub texts: usize,
    /// Tables indexed.
    pub tables: usize,
    /// Images indexed (described successfully).
    pub images: usize,
    /// Images whose description failed and were left out of the index.
    pub images_skipped: usize,
}

/// Persisted binding of a session to its vector-index collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: String,
    /// Collection holding the session's summary vectors.
    pub collection_name: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Hex SHA-256 of the uploaded document.
    pub document_sha256: String,
    /// Artifacts indexed per kind.
    #[serde(default)]
    pub counts: ArtifactCounts,
    /// Whether `content.json` was written for this session.
    #[serde(default)]
    pub content_persisted: bool,
}

impl SessionRecord {
    /// Build a record stamped with the current time.
    pub fn new(session_id: String, collection_name: String, document: &[u8]) -> Self {
        Self {
            session_id,
            collection_name,
            created_at: now_rfc3339(),
            document_sha256: document_digest(document),
            counts: ArtifactCounts::default(),
            content_persisted: false,
        }
    }
}

/// Hex SHA-256 digest of a document.
pub fn document_digest(document: &[u8]) -> String {
    hex::encode(Sha256::digest(document))
}

/// `content.json` entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
enum StoredOriginal {
    Text(String),
    Table(String),
    /// Position in `images.json`.
    ImageRef(usize),
    /// Image absent from `images.json`, stored inline.
    Image(ImageData),
}

impl StoredOriginal {
    fn new(artifact: &Artifact, images: &[ImageData]) -> Self {
        match artifact {
            Artifact::Text(text) => Self::Text(text.clone()),
            Artifact::Table(html) => Self::Table(html.clone()),
            Artifact::Image(image) => match images.iter().position(|stored| stored == image) {
                Some(position) => Self::ImageRef(position),
                None => Self::Image(image.clone()),
            },
        }
    }

    fn resolve(self, images: &[ImageData]) -> Option<Artifact> {
        match self {
            Self::Text(text) => Some(Artifact::Text(text)),
            Self::Table(html) => Some(Artifact::Table(html)),
            Self::ImageRef(position) => images.get(position).cloned().map(Artifact::Image),
            Self::Image(image) => Some(Artifact::Image(image)),
        }
    }
}

/// Filesystem-backed Session Store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Store rooted at `root`; directories are created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist the session record. Call this last: its presence marks the session usable.
    pub async fn save_record(&self, record: &SessionRecord) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(&record.session_id)?;
        write_json(&dir, RECORD_FILE, record).await
    }

    /// Load a session record.
    pub async fn load_record(&self, session_id: &str) -> Result<SessionRecord, SessionStoreError> {
        let path = self.session_dir(session_id)?.join(RECORD_FILE);
        read_json(&path)
            .await?
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))
    }

    /// Persist the raw image list.
    pub async fn save_images(
        &self,
        session_id: &str,
        images: &[ImageData],
    ) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(session_id)?;
        write_json(&dir, IMAGES_FILE, &images).await
    }

    /// Load the raw image list; a session without images yields an empty list.
    pub async fn load_images(&self, session_id: &str) -> Result<Vec<ImageData>, SessionStoreError> {
        let path = self.session_dir(session_id)?.join(IMAGES_FILE);
        Ok(read_json(&path).await?.unwrap_or_default())
    }

    /// Persist the content store. Images found in `images` are written as references to it.
    pub async fn save_content(
        &self,
        session_id: &str,
        content: &HashMap<String, Artifact>,
        images: &[ImageData],
    ) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(session_id)?;
        let stored: HashMap<&str, StoredOriginal> = content
            .iter()
            .map(|(doc_id, artifact)| (doc_id.as_str(), StoredOriginal::new(artifact, images)))
            .collect();
        write_json(&dir, CONTENT_FILE, &stored).await
    }

    /// Load the content store, or `None` when it was never persisted.
    ///
    /// `images` must be the list loaded from `images.json`. Entries pointing past its end are
    /// dropped.
    pub async fn load_content(
        &self,
        session_id: &str,
        images: &[ImageData],
    ) -> Result<Option<HashMap<String, Artifact>>, SessionStoreError> {
        let path = self.session_dir(session_id)?.join(CONTENT_FILE);
        let stored: Option<HashMap<String, StoredOriginal>> = read_json(&path).await?;
        Ok(stored.map(|entries| {
            entries
                .into_iter()
                .filter_map(|(doc_id, original)| match original.resolve(images) {
                    Some(artifact) => Some((doc_id, artifact)),
                    None => {
                        tracing::warn!(session_id, %doc_id, "Image reference outside images.json");
                        None
                    }
                })
                .collect()
        }))
    }

    /// Every persisted session record, newest first. Unreadable entries are skipped.
    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, SessionStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionStoreError::Io {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| {
            SessionStoreError::Io {
                path: self.root.clone(),
                source,
            }
        })? {
            let path = entry.path().join(RECORD_FILE);
            match read_json::<SessionRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(error) => tracing::warn!(%error, "Skipping unreadable session record"),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        if !is_valid_session_id(session_id) {
            return Err(SessionStoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.root.join(session_id))
    }
}

fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<(), SessionStoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| SessionStoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    let path = dir.join(file_name);
    let bytes = serde_json::to_vec(value).map_err(|source| SessionStoreError::Serde {
        path: path.clone(),
        source,
    })?;
    let staging = dir.join(format!(".{file_name}.tmp"));
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|source| SessionStoreError::Io {
            path: staging.clone(),
            source,
        })?;
    tokio::fs::rename(&staging, &path)
        .await
        .map_err(|source| SessionStoreError::Io { path, source })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SessionStoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SessionStoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SessionStoreError::Serde {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn record_images_and_content_survive_reload() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        let mut record = SessionRecord::new("abc123".into(), "pdf-abc123".into(), b"%PDF-1.7");
        record.counts.texts = 2;
        record.content_persisted = true;

        let images = vec![ImageData::new(vec![1, 2, 3]), ImageData::new(vec![4, 5])];
        let content = HashMap::from([
            ("d1".to_string(), Artifact::Text("hello".into())),
            ("d2".to_string(), Artifact::Image(ImageData::new(vec![9]))),
            ("d3".to_string(), Artifact::Image(images[1].clone())),
        ]);

        store.save_images("abc123", &images).await.expect("images");
        store
            .save_content("abc123", &content, &images)
            .await
            .expect("content");
        store.save_record(&record).await.expect("record");

        // A fresh store over the same root stands in for a restarted process.
        let reopened = SessionStore::new(dir.path());
        assert_eq!(reopened.load_record("abc123").await.expect("load"), record);
        assert_eq!(reopened.load_images("abc123").await.expect("images"), images);
        assert_eq!(
            reopened
                .load_content("abc123", &images)
                .await
                .expect("content"),
            Some(content)
        );
    }

    #[tokio::test]
    async fn content_file_references_stored_images_instead_of_repeating_them() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        let figure = ImageData::new(vec![0x89, b'P', b'N', b'G', 7, 7, 7]);
        let images = vec![figure.clone()];
        let content = HashMap::from([
            ("t".to_string(), Artifact::Table("<table/>".into())),
            ("i".to_string(), Artifact::Image(figure.clone())),
        ]);
        store.save_images("s1", &images).await.expect("images");
        store.save_content("s1", &content, &images).await.expect("content");

        let raw = std::fs::read_to_string(dir.path().join("s1").join("content.json"))
            .expect("content file");
        assert!(!raw.contains(&figure.to_base64()));
        assert!(raw.contains("image_ref"));

        // An images list shorter than recorded drops the dangling reference only.
        let restored = store
            .load_content("s1", &[])
            .await
            .expect("content")
            .expect("persisted");
        assert_eq!(
            restored,
            HashMap::from([("t".to_string(), Artifact::Table("<table/>".into()))])
        );
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        assert!(matches!(
            store.load_record("nope").await,
            Err(SessionStoreError::NotFound(_))
        ));
        assert!(store.load_images("nope").await.expect("images").is_empty());
        assert!(store.load_content("nope", &[]).await.expect("content").is_none());
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        for id in ["../etc", "a/b", "", "with space"] {
            assert!(matches!(
                store.load_record(id).await,
                Err(SessionStoreError::InvalidSessionId(_))
            ));
        }
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let dir = tempdir().expect("tempdir");
        let session_dir = dir.path().join("broken");
        std::fs::create_dir_all(&session_dir).expect("mkdir");
        std::fs::write(session_dir.join(RECORD_FILE), b"{not json").expect("write");
        let store = SessionStore::new(dir.path());
        assert!(matches!(
            store.load_record("broken").await,
            Err(SessionStoreError::Serde { .. })
        ));
    }

    #[tokio::test]
    async fn lists_only_committed_sessions() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        store
            .save_record(&SessionRecord::new("one".into(), "pdf-one".into(), b"a"))
            .await
            .expect("record");
        store
            .save_images("uncommitted", &[ImageData::new(vec![1])])
            .await
            .expect("images");

        let sessions = store.list_sessions().await.expect("list");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "one");
        assert_eq!(sessions[0].document_sha256, document_digest(b"a"));
    }
}

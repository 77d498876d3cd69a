//! Per-session index handle.

use std::sync::{Mutex, PoisonError, RwLock};

use serde::Serialize;

use super::content::ContentStore;
use crate::artifact::ImageData;
use crate::session::{Exchange, ExchangeLog};

/// How much original content a session handle can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Built by ingestion in this process, or rehydrated with a persisted content store.
    Complete,
    /// Rehydrated without originals; only the raw image list is available.
    ImagesOnly,
    /// Rehydrated without originals or images; similarity search still works but resolves nothing.
    Empty,
}

/// Handle binding one session to its collection, content store, and raw images.
#[derive(Debug)]
pub struct SessionIndex {
    session_id: String,
    collection_name: String,
    content: ContentStore,
    images: RwLock<Vec<ImageData>>,
    state: ContentState,
    history: Mutex<ExchangeLog>,
}

impl SessionIndex {
    pub(crate) fn new(
        session_id: String,
        collection_name: String,
        content: ContentStore,
        images: Vec<ImageData>,
        state: ContentState,
        history_capacity: usize,
    ) -> Self {
        Self {
            session_id,
            collection_name,
            content,
            images: RwLock::new(images),
            state,
            history: Mutex::new(ExchangeLog::new(history_capacity)),
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Vector-index namespace of this session.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Original artifacts keyed by `doc_id`.
    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Content availability of this handle.
    pub fn content_state(&self) -> ContentState {
        self.state
    }

    /// Raw images extracted from the document, in document order.
    pub fn images(&self) -> Vec<ImageData> {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the session holds any raw image.
    pub fn has_images(&self) -> bool {
        !self
            .images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub(crate) fn set_images(&self, images: Vec<ImageData>) {
        *self.images.write().unwrap_or_else(PoisonError::into_inner) = images;
    }

    /// Record an answered question.
    pub fn record_exchange(&self, exchange: Exchange) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(exchange);
    }

    /// Retained exchanges, oldest first.
    pub fn history(&self) -> Vec<Exchange> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }
}

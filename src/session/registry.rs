//! Process-wide registry of active session handles.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::store::SessionStore;
use crate::index::{DualStoreIndex, IndexError, SessionIndex};

/// Concurrent map from session id to its live index handle.
///
/// Handles are inserted if absent: when two requests race to rehydrate the same session, the
/// first insert wins and the other request adopts it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionIndex>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle unless one already exists; returns the registered handle.
    pub async fn insert(&self, handle: Arc<SessionIndex>) -> Arc<SessionIndex> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(handle.session_id().to_string())
            .or_insert(handle)
            .clone()
    }

    /// Active handle for `session_id`, if any.
    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionIndex>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Active handle for `session_id`, rehydrating it from the Session Store when absent.
    pub async fn get_or_rehydrate(
        &self,
        session_id: &str,
        index: &DualStoreIndex,
        store: &SessionStore,
    ) -> Result<Arc<SessionIndex>, IndexError> {
        if let Some(handle) = self.get(session_id).await {
            return Ok(handle);
        }
        tracing::debug!(session_id, "Session not active; rehydrating");
        let handle = index.rehydrate(store, session_id).await?;
        Ok(self.insert(Arc::new(handle)).await)
    }

    /// Identifiers of active sessions.
    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ContentState, ContentStore};

    fn handle(id: &str, collection: &str) -> Arc<SessionIndex> {
        Arc::new(SessionIndex::new(
            id.into(),
            collection.into(),
            ContentStore::new(),
            Vec::new(),
            ContentState::Complete,
            4,
        ))
    }

    #[tokio::test]
    async fn first_insert_wins() {
        let registry = SessionRegistry::new();
        let first = registry.insert(handle("s1", "first")).await;
        let second = registry.insert(handle("s1", "second")).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.collection_name(), "first");
        assert_eq!(registry.session_ids().await, vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_session_is_absent() {
        let registry = SessionRegistry::new();
        assert!(registry.get("missing").await.is_none());
    }
}

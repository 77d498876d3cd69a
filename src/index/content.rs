//! Content store holding original artifacts keyed by `doc_id`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::artifact::{Artifact, ArtifactKind};

/// In-memory map from `doc_id` to the original artifact.
#[derive(Debug, Default)]
pub struct ContentStore {
    entries: RwLock<HashMap<String, Artifact>>,
}

impl ContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from previously persisted entries.
    pub fn from_entries(entries: HashMap<String, Artifact>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Insert several entries at once.
    pub fn insert_many(&self, entries: impl IntoIterator<Item = (String, Artifact)>) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.extend(entries);
    }

    /// Remove entries, used to roll back a failed indexing call.
    pub fn remove_many<'a>(&self, doc_ids: impl IntoIterator<Item = &'a String>) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for doc_id in doc_ids {
            guard.remove(doc_id);
        }
    }

    /// Resolve an original by `doc_id`.
    pub fn get(&self, doc_id: &str) -> Option<Artifact> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(doc_id)
            .cloned()
    }

    /// Number of stored originals.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored originals of one kind.
    pub fn count_kind(&self, kind: ArtifactKind) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|artifact| artifact.kind() == kind)
            .count()
    }

    /// Text and table payloads containing `needle` (case-insensitive).
    pub fn texts_mentioning(&self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(Artifact::as_text)
            .filter(|text| text.to_lowercase().contains(&needle))
            .count()
    }

    /// Clone of every entry, for persistence.
    pub fn snapshot(&self) -> HashMap<String, Artifact> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_and_remove() {
        let store = ContentStore::new();
        store.insert_many([
            ("a".to_string(), Artifact::Text("Jane Smith wrote this".into())),
            ("b".to_string(), Artifact::Table("<table/>".into())),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.count_kind(ArtifactKind::Table), 1);
        assert_eq!(store.texts_mentioning("jane smith"), 1);

        store.remove_many(&["a".to_string()]);
        assert!(store.get("a").is_none());
        assert_eq!(store.get("b"), Some(Artifact::Table("<table/>".into())));
    }
}

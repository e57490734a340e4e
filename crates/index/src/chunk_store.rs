//! Persistent chunk metadata store.
//!
//! Maps chunk id to the last-known metadata of that chunk. This is the source
//! of truth for which chunks exist and what their content hash was when they
//! were last embedded.

use std::collections::HashMap;
use std::sync::Arc;

use vaultsearch_core::{AppError, AppResult};

use crate::storage::BlobStore;
use crate::types::ChunkMetadata;

/// Chunk metadata keyed by chunk id, serialized as one JSON blob.
pub struct ChunkStore {
    blobs: Arc<dyn BlobStore>,
    path: String,
    entries: HashMap<String, ChunkMetadata>,
    dirty: bool,
}

impl ChunkStore {
    /// Create an empty store persisted at `path` inside `blobs`.
    pub fn new(blobs: Arc<dyn BlobStore>, path: impl Into<String>) -> Self {
        Self {
            blobs,
            path: path.into(),
            entries: HashMap::new(),
            dirty: false,
        }
    }

    /// Load the persisted map, replacing in-memory state.
    ///
    /// A missing blob yields an empty store. An unparseable blob is returned
    /// as [`AppError::Corrupted`]; the caller decides whether to reset.
    pub fn load(&mut self) -> AppResult<()> {
        match self.blobs.read(&self.path)? {
            None => {
                tracing::debug!("No chunk store at {}, starting empty", self.path);
                self.entries.clear();
            }
            Some(contents) => {
                self.entries = serde_json::from_str(&contents).map_err(|e| {
                    AppError::Corrupted(format!("chunk store {}: {}", self.path, e))
                })?;
                tracing::debug!("Loaded {} chunk entries from {}", self.entries.len(), self.path);
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Persist the map. No-op when nothing changed since the last save.
    pub fn save(&mut self) -> AppResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string(&self.entries)?;
        self.blobs.write(&self.path, &json)?;
        self.dirty = false;
        tracing::debug!("Saved {} chunk entries to {}", self.entries.len(), self.path);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ChunkMetadata> {
        self.entries.get(id)
    }

    pub fn set(&mut self, id: impl Into<String>, metadata: ChunkMetadata) {
        self.entries.insert(id.into(), metadata);
        self.dirty = true;
    }

    pub fn delete(&mut self, id: &str) -> Option<ChunkMetadata> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Entries for a document, ordered by chunk index.
    pub fn get_all_for_path(&self, path: &str) -> Vec<(String, ChunkMetadata)> {
        let mut found: Vec<(String, ChunkMetadata)> = self
            .entries
            .iter()
            .filter(|(_, meta)| meta.file_path == path)
            .map(|(id, meta)| (id.clone(), meta.clone()))
            .collect();
        found.sort_by_key(|(_, meta)| meta.chunk_index);
        found
    }

    /// Remove every entry for a document, returning the removed ids.
    pub fn delete_all_for_path(&mut self, path: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, meta)| meta.file_path == path)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.entries.remove(id);
        }
        if !ids.is_empty() {
            self.dirty = true;
        }
        ids
    }

    pub fn all(&self) -> Vec<(String, ChunkMetadata)> {
        self.entries
            .iter()
            .map(|(id, meta)| (id.clone(), meta.clone()))
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Drop all entries and force the next save to rewrite the blob.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    /// Copy of the current entries, used to roll back a failed rebuild.
    pub fn snapshot(&self) -> HashMap<String, ChunkMetadata> {
        self.entries.clone()
    }

    /// Replace all entries with a snapshot.
    pub fn restore(&mut self, snapshot: HashMap<String, ChunkMetadata>) {
        self.entries = snapshot;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsBlobStore;
    use tempfile::TempDir;

    fn meta(path: &str, index: i32, hash: &str) -> ChunkMetadata {
        ChunkMetadata {
            content_hash: hash.to_string(),
            file_path: path.to_string(),
            chunk_index: index,
            timestamp: 0,
        }
    }

    fn store(temp: &TempDir) -> ChunkStore {
        let blobs = Arc::new(FsBlobStore::new(temp.path()).unwrap());
        ChunkStore::new(blobs, "chunks.json")
    }

    #[test]
    fn test_missing_blob_loads_empty() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.load().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.set("a.md#0", meta("a.md", 0, "h0"));
        store.set("a.md#1", meta("a.md", 1, "h1"));
        store.set("b.md#0", meta("b.md", 0, "h2"));
        store.save().unwrap();

        let mut reloaded = self::store(&temp);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.get("a.md#1").unwrap().content_hash, "h1");
    }

    #[test]
    fn test_save_skipped_when_clean() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.save().unwrap();
        assert!(!temp.path().join("chunks.json").exists());

        store.set("a.md#0", meta("a.md", 0, "h0"));
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());

        // Deleting a missing id does not dirty the store
        assert!(store.delete("zzz").is_none());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_path_queries() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.set("a.md#1", meta("a.md", 1, "h1"));
        store.set("a.md#-1", meta("a.md", -1, "hp"));
        store.set("b.md#0", meta("b.md", 0, "h2"));

        let for_a = store.get_all_for_path("a.md");
        let order: Vec<i32> = for_a.iter().map(|(_, m)| m.chunk_index).collect();
        assert_eq!(order, vec![-1, 1]);

        let mut removed = store.delete_all_for_path("a.md");
        removed.sort();
        assert_eq!(removed, vec!["a.md#-1".to_string(), "a.md#1".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_corrupt_blob_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("chunks.json"), "{not json").unwrap();
        let mut store = store(&temp);
        assert!(matches!(store.load(), Err(AppError::Corrupted(_))));
    }

    #[test]
    fn test_snapshot_restore() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.set("a.md#0", meta("a.md", 0, "h0"));
        let snapshot = store.snapshot();
        store.clear();
        assert!(store.is_empty());
        store.restore(snapshot);
        assert_eq!(store.len(), 1);
    }
}

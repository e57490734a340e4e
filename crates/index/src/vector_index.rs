//! Vector index abstraction for chunks.
//!
//! Defines the contract the sync manager drives, plus optional capabilities
//! (deferred persistence, rebuild backup) that an engine may or may not
//! offer. Capabilities are discovered through accessor methods returning
//! `Option<&mut dyn ...>` rather than by probing for methods at runtime.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use vaultsearch_core::AppResult;

use crate::embeddings::EmbedProgress;
use crate::types::{Chunk, ChunkMetadata, IndexStats, IndexedChunk, SearchHit};

/// Outcome of loading persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No persisted state existed; a fresh index was created.
    Created,

    /// Persisted state was loaded as-is.
    Loaded,

    /// Persisted state was unusable and set aside; the index starts empty.
    Reset,
}

/// State of an index after [`VectorIndex::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub outcome: LoadOutcome,
    pub dimension: usize,
    pub count: usize,
    pub requires_rebuild: bool,
}

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Adding, updating and deleting chunks by id
/// - Hybrid (text + vector) top-k queries
/// - Whole-index rebuild to an empty index of the same dimension
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Load persisted state, recovering from corruption or a dimension change.
    async fn initialize(&mut self) -> AppResult<IndexStatus>;

    /// Embedding dimension of the index (0 before initialization).
    fn dimension(&self) -> usize;

    /// Embed chunks that lack an embedding and insert them.
    ///
    /// `progress` is called once per embedding batch. Returns the number of
    /// records inserted.
    async fn add(&mut self, chunks: Vec<Chunk>, progress: Option<&EmbedProgress>)
        -> AppResult<usize>;

    /// Replace records with freshly embedded versions.
    async fn update(
        &mut self,
        chunks: Vec<Chunk>,
        progress: Option<&EmbedProgress>,
    ) -> AppResult<usize>;

    /// Remove records by id. Unknown ids are ignored.
    fn delete(&mut self, ids: &[String]) -> AppResult<usize>;

    /// Exact-id lookup.
    fn get(&self, id: &str) -> Option<&IndexedChunk>;

    /// Hybrid query for the `top_k` best chunks.
    async fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<SearchHit>>;

    /// Total indexed records.
    fn count(&self) -> usize;

    /// Id and metadata of every record, for reconciling a lost chunk store.
    fn chunk_metadata(&self) -> Vec<(String, ChunkMetadata)>;

    /// Known embeddings keyed by content hash, for the given hashes.
    fn embeddings_for_hashes(&self, hashes: &HashSet<&str>) -> HashMap<String, Vec<f32>>;

    /// Clear to an empty index of the current dimension.
    ///
    /// Engines offering [`RebuildBackup`] snapshot their persisted state first.
    fn rebuild(&mut self) -> AppResult<()>;

    fn requires_rebuild(&self) -> bool;

    fn stats(&self) -> IndexStats;

    /// Deferred persistence, if supported.
    fn batch_persistence(&mut self) -> Option<&mut dyn BatchPersistence> {
        None
    }

    /// Rebuild backup and rollback, if supported.
    fn rebuild_backup(&mut self) -> Option<&mut dyn RebuildBackup> {
        None
    }
}

/// Persistence that can be deferred during bulk mutation.
pub trait BatchPersistence {
    /// While enabled, mutations persist periodically instead of every time.
    /// Disabling does not write; call [`flush_pending_persist`] afterwards.
    ///
    /// [`flush_pending_persist`]: BatchPersistence::flush_pending_persist
    fn set_batch_mode(&mut self, enabled: bool);

    fn is_batch_mode(&self) -> bool;

    /// Write any deferred state now.
    fn flush_pending_persist(&mut self) -> AppResult<()>;
}

/// Backup of persisted state taken by [`VectorIndex::rebuild`].
pub trait RebuildBackup {
    fn has_backup(&self) -> bool;

    /// Reinstate the backup. Returns `false` when there is none.
    fn restore_from_backup(&mut self) -> AppResult<bool>;

    /// Discard the backup after a successful rebuild.
    fn delete_backup(&mut self) -> AppResult<()>;
}

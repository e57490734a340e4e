//! Index synchronization: diff-based sync, full rebuild, single-file updates.
//!
//! The manager owns the chunk store and the vector index and keeps the two
//! consistent. The chunk store is only mutated after the matching index
//! mutation succeeded, so an interrupted pass is simply retried by the next.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use vaultsearch_core::{AppError, AppResult};

use crate::chunk::{chunk_document, ChunkConfig};
use crate::chunk_store::ChunkStore;
use crate::embeddings::EmbedProgress;
use crate::notice::{Notice, NoticeSink};
use crate::pause::PauseHandle;
use crate::progress::ProgressReporter;
use crate::source::DocumentSource;
use crate::types::{
    Chunk, ChunkMetadata, DocumentInfo, IndexStats, RebuildSummary, SearchHit, SyncError,
    SyncSummary,
};
use crate::vector_index::{IndexStatus, LoadOutcome, VectorIndex};

/// Default number of chunks handed to the index per rebuild step.
pub const DEFAULT_REBUILD_BATCH_SIZE: usize = 100;

/// Orchestrates a [`DocumentSource`], a [`ChunkStore`] and a [`VectorIndex`].
///
/// Operations take `&mut self`, so they are serialized per instance. Hosts
/// that share a manager wrap it in an async mutex.
pub struct IndexSyncManager<I: VectorIndex> {
    source: Arc<dyn DocumentSource>,
    store: ChunkStore,
    index: I,
    chunking: ChunkConfig,
    rebuild_batch_size: usize,
    pause: PauseHandle,
    progress: ProgressReporter,
    notices: NoticeSink,
}

impl<I: VectorIndex> IndexSyncManager<I> {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: ChunkStore,
        index: I,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            source,
            store,
            index,
            chunking,
            rebuild_batch_size: DEFAULT_REBUILD_BATCH_SIZE,
            pause: PauseHandle::new(),
            progress: ProgressReporter::noop(),
            notices: NoticeSink::log_only(),
        }
    }

    pub fn with_rebuild_batch_size(mut self, batch_size: usize) -> Self {
        self.rebuild_batch_size = batch_size.max(1);
        self
    }

    pub fn with_pause(mut self, pause: PauseHandle) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.notices = notices;
        self
    }

    /// Handle for pausing and resuming a rebuild from another task.
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut I {
        &mut self.index
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Load both stores and reconcile them.
    ///
    /// An index that had to be reset empties the chunk store so the next sync
    /// re-adds everything. Otherwise the chunk store is reconciled with the
    /// index records, which covers a lost store and a crash mid-rebuild.
    pub async fn initialize(&mut self) -> AppResult<IndexStatus> {
        let status = self.index.initialize().await?;

        match self.store.load() {
            Ok(()) => {}
            Err(AppError::Corrupted(message)) => {
                tracing::warn!("Chunk store unreadable ({}), rebuilding it", message);
                self.store.reset();
            }
            Err(e) => return Err(e),
        }

        if status.outcome == LoadOutcome::Reset {
            if !self.store.is_empty() {
                tracing::info!("Index was reset; clearing {} chunk entries", self.store.len());
            }
            self.store.clear();
        } else {
            self.reconcile_with_index();
        }

        self.store.save()?;
        Ok(status)
    }

    /// Make the chunk store describe exactly what the index holds.
    ///
    /// Entries the index lacks, or holds with different content, would never
    /// be re-embedded by a diff pass, so the index records win.
    fn reconcile_with_index(&mut self) {
        let indexed: HashMap<String, ChunkMetadata> =
            self.index.chunk_metadata().into_iter().collect();

        let stale = self
            .store
            .all()
            .into_iter()
            .filter(|(id, meta)| {
                indexed
                    .get(id)
                    .map_or(true, |known| known.content_hash != meta.content_hash)
            })
            .count();
        let missing = indexed
            .keys()
            .filter(|id| self.store.get(id).is_none())
            .count();

        if stale == 0 && missing == 0 {
            return;
        }
        if self.store.is_empty() {
            tracing::info!("Recovering {} chunk entries from the index", indexed.len());
        } else {
            tracing::warn!(
                "Chunk store out of step with the index ({} stale, {} missing); taking the index records",
                stale,
                missing
            );
        }
        self.store.restore(indexed);
    }

    /// Query the index.
    pub async fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        self.index.query(text, top_k).await
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Incrementally reconcile the index with the current documents.
    pub async fn diff_and_sync(&mut self) -> AppResult<SyncSummary> {
        let start = Instant::now();
        self.progress.restart();
        self.end_batch_mode()?;

        let documents = self.source.list_documents()?;
        let total_files = documents.len();
        self.progress.scanning(total_files);
        tracing::info!("Syncing {} documents", total_files);

        let mut summary = SyncSummary::default();
        let mut expected: HashSet<String> = HashSet::new();
        let mut to_add = Vec::new();
        let mut to_update = Vec::new();

        for (i, doc) in documents.iter().enumerate() {
            self.progress.processing(i + 1, total_files, &doc.path);

            match self.prepare_document(&doc.path) {
                Ok(chunks) => {
                    for chunk in chunks {
                        expected.insert(chunk.id.clone());
                        match self.store.get(&chunk.id) {
                            None => to_add.push(chunk),
                            Some(known) if known.content_hash != chunk.content_hash => {
                                to_update.push(chunk)
                            }
                            Some(_) => {}
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to process {}: {}", doc.path, e);
                    // Keep what we had so a read failure never deletes chunks.
                    for (id, _) in self.store.get_all_for_path(&doc.path) {
                        expected.insert(id);
                    }
                    summary.errors.push(SyncError {
                        path: doc.path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut to_delete: Vec<String> = self
            .store
            .ids()
            .filter(|id| !expected.contains(id.as_str()))
            .cloned()
            .collect();
        to_delete.sort();

        let total_chunks = to_add.len() + to_update.len();
        tracing::debug!(
            "Diff: {} to add, {} to update, {} to delete",
            to_add.len(),
            to_update.len(),
            to_delete.len()
        );

        if !to_add.is_empty() {
            let metadata = collect_metadata(&to_add);
            let size = to_add.len();
            let report = embed_progress(self.progress.clone(), total_files, 0, size, total_chunks);
            let progress: &EmbedProgress = &report;
            self.index.add(to_add, Some(progress)).await?;
            summary.added = size;
            for (id, meta) in metadata {
                self.store.set(id, meta);
            }
        }

        if !to_update.is_empty() {
            let metadata = collect_metadata(&to_update);
            let size = to_update.len();
            let report = embed_progress(
                self.progress.clone(),
                total_files,
                summary.added,
                size,
                total_chunks,
            );
            let progress: &EmbedProgress = &report;
            self.index.update(to_update, Some(progress)).await?;
            summary.updated = size;
            for (id, meta) in metadata {
                self.store.set(id, meta);
            }
        }

        if !to_delete.is_empty() {
            self.index.delete(&to_delete)?;
            for id in &to_delete {
                self.store.delete(id);
            }
            summary.deleted = to_delete.len();
        }

        self.progress.finalizing(total_files);
        self.store.save()?;

        summary.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Sync complete: {} added, {} updated, {} deleted, {} errors in {}ms",
            summary.added,
            summary.updated,
            summary.deleted,
            summary.errors.len(),
            summary.duration_ms
        );
        Ok(summary)
    }

    /// Re-create the index from scratch.
    ///
    /// On failure the index is restored from its pre-rebuild backup and the
    /// chunk store from its snapshot, and the error is returned as
    /// [`AppError::RebuildFailed`].
    pub async fn rebuild_index(&mut self) -> AppResult<RebuildSummary> {
        let start = Instant::now();
        self.progress.restart();
        self.end_batch_mode()?;

        let documents = self.source.list_documents()?;
        let total_files = documents.len();
        self.progress.scanning(total_files);
        tracing::info!("Rebuilding index from {} documents", total_files);

        let snapshot = self.store.snapshot();
        let mut errors = Vec::new();

        match self.run_rebuild(&documents, &mut errors).await {
            Ok(chunks) => {
                let summary = RebuildSummary {
                    files: total_files - errors.len(),
                    chunks,
                    errors,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                tracing::info!(
                    "Rebuild complete: {} chunks from {} files in {}ms",
                    summary.chunks,
                    summary.files,
                    summary.duration_ms
                );
                self.notices.notify(Notice::RebuildSucceeded {
                    files: summary.files,
                    chunks: summary.chunks,
                });
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Rebuild failed: {}", e);
                let restored = self.recover_failed_rebuild(snapshot);
                self.notices.notify(Notice::RebuildFailed {
                    message: e.to_string(),
                    errors: errors.len(),
                    restored,
                });
                Err(AppError::RebuildFailed {
                    message: e.to_string(),
                    errors: errors.iter().map(ToString::to_string).collect(),
                })
            }
        }
    }

    async fn run_rebuild(
        &mut self,
        documents: &[DocumentInfo],
        errors: &mut Vec<SyncError>,
    ) -> AppResult<usize> {
        let total_files = documents.len();

        if let Some(batch) = self.index.batch_persistence() {
            batch.set_batch_mode(true);
        }
        self.index.rebuild()?;
        self.store.clear();

        let mut chunks = Vec::new();
        for (i, doc) in documents.iter().enumerate() {
            self.progress.processing(i + 1, total_files, &doc.path);
            match self.prepare_document(&doc.path) {
                Ok(doc_chunks) => chunks.extend(doc_chunks),
                Err(e) => {
                    tracing::warn!("Failed to process {}: {}", doc.path, e);
                    errors.push(SyncError {
                        path: doc.path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let total_chunks = chunks.len();
        let mut done = 0;
        let mut remaining = chunks.into_iter();
        loop {
            let batch: Vec<Chunk> = remaining.by_ref().take(self.rebuild_batch_size).collect();
            if batch.is_empty() {
                break;
            }

            self.pause.wait_while_paused().await;

            let metadata = collect_metadata(&batch);
            let size = batch.len();
            let report = embed_progress(self.progress.clone(), total_files, done, size, total_chunks);
            let progress: &EmbedProgress = &report;
            self.index.add(batch, Some(progress)).await?;
            for (id, meta) in metadata {
                self.store.set(id, meta);
            }
            done += size;
            tracing::debug!("Rebuilt {}/{} chunks", done, total_chunks);
        }

        self.progress.finalizing(total_files);
        self.store.save()?;
        if let Some(batch) = self.index.batch_persistence() {
            batch.flush_pending_persist()?;
            batch.set_batch_mode(false);
        }
        if let Some(backup) = self.index.rebuild_backup() {
            backup.delete_backup()?;
        }

        Ok(total_chunks)
    }

    /// Roll both stores back after a failed rebuild. Returns whether the
    /// previous index state was restored.
    fn recover_failed_rebuild(&mut self, snapshot: HashMap<String, ChunkMetadata>) -> bool {
        if let Some(batch) = self.index.batch_persistence() {
            batch.set_batch_mode(false);
            if let Err(e) = batch.flush_pending_persist() {
                tracing::warn!("Failed to flush partial rebuild: {}", e);
            }
        }

        let restored = match self.index.rebuild_backup() {
            Some(backup) => match backup.restore_from_backup() {
                Ok(restored) => restored,
                Err(e) => {
                    tracing::error!("Failed to restore index backup: {}", e);
                    false
                }
            },
            None => false,
        };

        if restored {
            self.store.restore(snapshot);
        } else {
            // No backup to return to: describe whatever the index now holds.
            self.store.reset();
            for (id, meta) in self.index.chunk_metadata() {
                self.store.set(id, meta);
            }
        }

        if let Err(e) = self.store.save() {
            tracing::error!("Failed to save chunk store after rollback: {}", e);
        }
        restored
    }

    /// Re-index one document, reusing embeddings of unchanged content.
    pub async fn index_file(&mut self, path: &str) -> AppResult<SyncSummary> {
        let start = Instant::now();
        self.end_batch_mode()?;

        let chunks = self.prepare_document(path)?;
        let fresh_ids: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .get_all_for_path(path)
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| !fresh_ids.contains(id.as_str()))
            .collect();

        let changed: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| {
                self.store
                    .get(&chunk.id)
                    .map(|known| known.content_hash != chunk.content_hash)
                    .unwrap_or(true)
            })
            .collect();

        let hashes: HashSet<&str> = changed.iter().map(|c| c.content_hash.as_str()).collect();
        let known = self.index.embeddings_for_hashes(&hashes);

        let mut reused = 0;
        let mut to_add = Vec::new();
        let mut to_update = Vec::new();
        for mut chunk in changed {
            if let Some(embedding) = known.get(&chunk.content_hash) {
                chunk.embedding = Some(embedding.clone());
                reused += 1;
            }
            if self.store.get(&chunk.id).is_some() {
                to_update.push(chunk);
            } else {
                to_add.push(chunk);
            }
        }

        let mut summary = SyncSummary::default();

        if !to_add.is_empty() {
            let metadata = collect_metadata(&to_add);
            summary.added = self.index.add(to_add, None).await?;
            for (id, meta) in metadata {
                self.store.set(id, meta);
            }
        }
        if !to_update.is_empty() {
            let metadata = collect_metadata(&to_update);
            summary.updated = self.index.update(to_update, None).await?;
            for (id, meta) in metadata {
                self.store.set(id, meta);
            }
        }
        if !stale.is_empty() {
            self.index.delete(&stale)?;
            for id in &stale {
                self.store.delete(id);
            }
            summary.deleted = stale.len();
        }

        self.store.save()?;
        summary.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {}: {} added, {} updated ({} embeddings reused), {} deleted",
            path,
            summary.added,
            summary.updated,
            reused,
            summary.deleted
        );
        Ok(summary)
    }

    /// Remove every chunk of one document. Returns the number removed.
    pub fn remove_file(&mut self, path: &str) -> AppResult<usize> {
        self.end_batch_mode()?;

        let ids: Vec<String> = self
            .store
            .get_all_for_path(path)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            tracing::debug!("No chunks indexed for {}", path);
            return Ok(0);
        }

        self.index.delete(&ids)?;
        self.store.delete_all_for_path(path);
        self.store.save()?;

        tracing::info!("Removed {} chunks for {}", ids.len(), path);
        Ok(ids.len())
    }

    fn prepare_document(&self, path: &str) -> AppResult<Vec<Chunk>> {
        let text = self.source.read_document(path)?;
        Ok(chunk_document(path, &text, &self.chunking))
    }

    /// Leave any batch mode an abandoned operation may have left on.
    fn end_batch_mode(&mut self) -> AppResult<()> {
        if let Some(batch) = self.index.batch_persistence() {
            if batch.is_batch_mode() {
                tracing::warn!("Previous operation did not finish; flushing deferred writes");
                batch.set_batch_mode(false);
                batch.flush_pending_persist()?;
            }
        }
        Ok(())
    }
}

fn collect_metadata(chunks: &[Chunk]) -> Vec<(String, ChunkMetadata)> {
    chunks.iter().map(|c| (c.id.clone(), c.metadata())).collect()
}

/// Translate per-batch embedding progress into chunk progress.
fn embed_progress(
    reporter: ProgressReporter,
    total_files: usize,
    offset: usize,
    size: usize,
    total_chunks: usize,
) -> impl Fn(usize, usize) + Send + Sync {
    move |completed, batches| {
        let done = if batches == 0 {
            size
        } else {
            size * completed / batches
        };
        reporter.indexing(total_files, offset + done, total_chunks);
    }
}

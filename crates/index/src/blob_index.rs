//! JSON-blob vector index.
//!
//! Keeps every record in memory and persists the whole index as a single
//! JSON document. The persisted form records the embedding dimension and the
//! provider/model that produced the vectors, so a change of model is caught
//! on load instead of silently mixing vector spaces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use vaultsearch_core::{AppError, AppResult};

use crate::embeddings::{EmbedProgress, Embedder};
use crate::notice::{Notice, NoticeSink};
use crate::search::{hybrid_rank, HybridWeights, TermIndex};
use crate::storage::BlobStore;
use crate::types::{Chunk, ChunkMetadata, IndexStats, IndexedChunk, SearchHit};
use crate::vector_index::{
    BatchPersistence, IndexStatus, LoadOutcome, RebuildBackup, VectorIndex,
};

/// Default blob name for the index.
pub const INDEX_BLOB: &str = "index.json";

/// Mutations between writes while batch mode is on.
pub const DEFAULT_FLUSH_INTERVAL: usize = 10;

const BACKUP_SUFFIX: &str = ".backup";
const FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIndex {
    version: u32,
    dimension: usize,
    provider: String,
    model: String,
    #[serde(default)]
    document_count: usize,
    documents: Vec<IndexedChunk>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredIndexRef<'a> {
    version: u32,
    dimension: usize,
    provider: &'a str,
    model: &'a str,
    document_count: usize,
    documents: Vec<&'a IndexedChunk>,
}

/// In-memory vector index persisted as one JSON blob.
pub struct JsonVectorIndex {
    blobs: Arc<dyn BlobStore>,
    path: String,
    embedder: Embedder,
    weights: HybridWeights,
    notices: NoticeSink,

    dimension: usize,
    records: BTreeMap<String, IndexedChunk>,
    terms: TermIndex,
    cached_count: usize,
    requires_rebuild: bool,

    batch_mode: bool,
    pending_persist: bool,
    mutations_since_persist: usize,
    flush_interval: usize,
}

impl JsonVectorIndex {
    pub fn new(blobs: Arc<dyn BlobStore>, embedder: Embedder) -> Self {
        Self {
            blobs,
            path: INDEX_BLOB.to_string(),
            embedder,
            weights: HybridWeights::default(),
            notices: NoticeSink::log_only(),
            dimension: 0,
            records: BTreeMap::new(),
            terms: TermIndex::new(),
            cached_count: 0,
            requires_rebuild: false,
            batch_mode: false,
            pending_persist: false,
            mutations_since_persist: 0,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_notices(mut self, notices: NoticeSink) -> Self {
        self.notices = notices;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: usize) -> Self {
        self.flush_interval = flush_interval.max(1);
        self
    }

    pub fn backup_path(&self) -> String {
        format!("{}{}", self.path, BACKUP_SUFFIX)
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Rank records against an already computed query vector.
    pub fn search_by_vector(
        &self,
        text: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<SearchHit>> {
        if vector.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let text_scores = self.terms.scores(text);
        Ok(hybrid_rank(
            self.records.values(),
            vector,
            &text_scores,
            &self.weights,
            top_k,
        ))
    }

    fn provider_label(&self) -> (String, String) {
        let provider = self.embedder.provider();
        (
            provider.provider_name().to_string(),
            provider.model_name().to_string(),
        )
    }

    fn ensure_initialized(&self) -> AppResult<()> {
        if self.dimension == 0 {
            return Err(AppError::Index(
                "Vector index used before initialize()".to_string(),
            ));
        }
        Ok(())
    }

    fn check_dimension(&self, actual: usize) -> AppResult<()> {
        if actual != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    /// Embed every chunk that does not already carry an embedding.
    async fn embed_missing(
        &self,
        chunks: Vec<Chunk>,
        progress: Option<&EmbedProgress>,
    ) -> AppResult<Vec<IndexedChunk>> {
        let mut ready = Vec::with_capacity(chunks.len());
        let mut pending = Vec::new();

        for mut chunk in chunks {
            match chunk.embedding.take() {
                Some(embedding) => {
                    self.check_dimension(embedding.len())?;
                    ready.push(IndexedChunk::from_chunk(chunk, embedding));
                }
                None => pending.push(chunk),
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_texts(&texts, progress).await?;
            for (chunk, vector) in pending.into_iter().zip(vectors) {
                self.check_dimension(vector.len())?;
                ready.push(IndexedChunk::from_chunk(chunk, vector));
            }
        }

        Ok(ready)
    }

    fn insert(&mut self, record: IndexedChunk) {
        self.terms.insert(&record.id, &record.content);
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> bool {
        self.terms.remove(id);
        self.records.remove(id).is_some()
    }

    fn clear_memory(&mut self) {
        self.records.clear();
        self.terms.clear();
        self.cached_count = 0;
    }

    /// Record a mutation, persisting now or later depending on batch mode.
    fn mark_mutated(&mut self) -> AppResult<()> {
        self.cached_count = self.records.len();
        if !self.batch_mode {
            return self.persist();
        }

        self.pending_persist = true;
        self.mutations_since_persist += 1;
        if self.mutations_since_persist >= self.flush_interval {
            tracing::debug!(
                "Periodic flush after {} batched mutations",
                self.mutations_since_persist
            );
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> AppResult<()> {
        let (provider, model) = self.provider_label();
        let stored = StoredIndexRef {
            version: FORMAT_VERSION,
            dimension: self.dimension,
            provider: &provider,
            model: &model,
            document_count: self.records.len(),
            documents: self.records.values().collect(),
        };
        let json = serde_json::to_string(&stored)?;
        self.blobs.write(&self.path, &json)?;

        self.pending_persist = false;
        self.mutations_since_persist = 0;
        tracing::debug!("Persisted {} records to {}", self.records.len(), self.path);
        Ok(())
    }

    /// Validate stored records and make them the live state.
    ///
    /// Returns the previous `provider/model` label when it differs from the
    /// current provider.
    fn install(&mut self, stored: StoredIndex) -> AppResult<Option<String>> {
        if stored.version > FORMAT_VERSION {
            return Err(AppError::Corrupted(format!(
                "Unsupported index format version {}",
                stored.version
            )));
        }

        let mut records = BTreeMap::new();
        for record in stored.documents {
            if record.embedding.len() != stored.dimension {
                return Err(AppError::Corrupted(format!(
                    "Record '{}' has {} dimensions, index declares {}",
                    record.id,
                    record.embedding.len(),
                    stored.dimension
                )));
            }
            if records.contains_key(&record.id) {
                return Err(AppError::Corrupted(format!(
                    "Duplicate record id '{}'",
                    record.id
                )));
            }
            records.insert(record.id.clone(), record);
        }

        self.clear_memory();
        for record in records.into_values() {
            self.insert(record);
        }
        self.cached_count = stored.document_count;

        let (provider, model) = self.provider_label();
        if stored.provider != provider || stored.model != model {
            return Ok(Some(format!("{}/{}", stored.provider, stored.model)));
        }
        Ok(None)
    }

    /// Move the persisted blob aside and start over with an empty index.
    fn set_aside(&mut self) -> AppResult<String> {
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S");
        let backup = format!("{}.{}.bak", self.path, stamp);
        self.blobs.rename(&self.path, &backup)?;

        self.clear_memory();
        self.requires_rebuild = true;
        self.persist()?;
        Ok(backup)
    }
}

#[async_trait]
impl VectorIndex for JsonVectorIndex {
    async fn initialize(&mut self) -> AppResult<IndexStatus> {
        let dimension = self.embedder.resolve_dimension().await?;
        self.dimension = dimension;
        self.clear_memory();
        self.requires_rebuild = false;
        self.pending_persist = false;
        self.mutations_since_persist = 0;

        let mut outcome = match self.blobs.read(&self.path)? {
            None => {
                self.persist()?;
                tracing::info!("Created empty index with dimension {}", dimension);
                LoadOutcome::Created
            }
            Some(raw) => match serde_json::from_str::<StoredIndex>(&raw) {
                Err(e) => {
                    tracing::error!("Failed to parse {}: {}", self.path, e);
                    let backup = self.set_aside()?;
                    self.notices.notify(Notice::IndexCorrupted { backup });
                    LoadOutcome::Reset
                }
                Ok(stored) if stored.dimension != dimension => {
                    let previous = stored.dimension;
                    let backup = self.set_aside()?;
                    self.notices.notify(Notice::DimensionChanged {
                        previous,
                        current: dimension,
                        backup,
                    });
                    LoadOutcome::Reset
                }
                Ok(stored) => match self.install(stored) {
                    Ok(previous_model) => {
                        if let Some(previous) = previous_model {
                            let (provider, model) = self.provider_label();
                            self.requires_rebuild = true;
                            self.notices.notify(Notice::ModelChanged {
                                previous,
                                current: format!("{}/{}", provider, model),
                            });
                        }
                        tracing::info!(
                            "Loaded {} records (dimension {}) from {}",
                            self.records.len(),
                            dimension,
                            self.path
                        );
                        LoadOutcome::Loaded
                    }
                    Err(e) => {
                        tracing::error!("Rejected {}: {}", self.path, e);
                        let backup = self.set_aside()?;
                        self.notices.notify(Notice::IndexCorrupted { backup });
                        LoadOutcome::Reset
                    }
                },
            },
        };

        // A leftover backup is the last complete state; the main blob may hold
        // a partially rebuilt index.
        let backup = self.backup_path();
        if self.blobs.exists(&backup) {
            tracing::warn!("Found {} from an unfinished rebuild", backup);
            let restored = match self.restore_from_backup() {
                Ok(restored) => restored,
                Err(e) => {
                    tracing::error!("Failed to restore {}: {}", backup, e);
                    false
                }
            };
            if restored {
                outcome = LoadOutcome::Loaded;
            } else {
                self.requires_rebuild = true;
            }
            self.notices.notify(Notice::InterruptedRebuild { restored });
        }

        Ok(IndexStatus {
            outcome,
            dimension,
            count: self.count(),
            requires_rebuild: self.requires_rebuild,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(
        &mut self,
        chunks: Vec<Chunk>,
        progress: Option<&EmbedProgress>,
    ) -> AppResult<usize> {
        self.ensure_initialized()?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let records = self.embed_missing(chunks, progress).await?;
        let added = records.len();
        for record in records {
            self.insert(record);
        }
        self.mark_mutated()?;

        tracing::debug!("Added {} records", added);
        Ok(added)
    }

    async fn update(
        &mut self,
        chunks: Vec<Chunk>,
        progress: Option<&EmbedProgress>,
    ) -> AppResult<usize> {
        self.ensure_initialized()?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let records = self.embed_missing(chunks, progress).await?;
        let updated = records.len();
        for record in records {
            self.remove(&record.id);
            self.insert(record);
        }
        self.mark_mutated()?;

        tracing::debug!("Updated {} records", updated);
        Ok(updated)
    }

    fn delete(&mut self, ids: &[String]) -> AppResult<usize> {
        let removed = ids.iter().filter(|id| self.remove(id)).count();
        if removed > 0 {
            self.mark_mutated()?;
        }
        tracing::debug!("Deleted {} of {} requested records", removed, ids.len());
        Ok(removed)
    }

    fn get(&self, id: &str) -> Option<&IndexedChunk> {
        self.records.get(id)
    }

    async fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        if text.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_initialized()?;

        if self.requires_rebuild {
            tracing::warn!(
                "Querying an index that needs a rebuild; results may be incomplete or inconsistent"
            );
        }

        let vector = self.embedder.embed_one(text).await?;
        let hits = self.search_by_vector(text, &vector, top_k)?;
        tracing::debug!("Query returned {} hits (requested top-{})", hits.len(), top_k);
        Ok(hits)
    }

    fn count(&self) -> usize {
        if self.cached_count == 0 && !self.records.is_empty() {
            return self.records.len();
        }
        self.cached_count
    }

    fn chunk_metadata(&self) -> Vec<(String, ChunkMetadata)> {
        self.records
            .values()
            .map(|record| {
                (
                    record.id.clone(),
                    ChunkMetadata {
                        content_hash: record.content_hash.clone(),
                        file_path: record.file_path.clone(),
                        chunk_index: record.chunk_index,
                        timestamp: record.timestamp,
                    },
                )
            })
            .collect()
    }

    fn embeddings_for_hashes(&self, hashes: &HashSet<&str>) -> HashMap<String, Vec<f32>> {
        self.records
            .values()
            .filter(|record| hashes.contains(record.content_hash.as_str()))
            .map(|record| (record.content_hash.clone(), record.embedding.clone()))
            .collect()
    }

    fn rebuild(&mut self) -> AppResult<()> {
        self.ensure_initialized()?;
        let backup = self.backup_path();

        if self.blobs.exists(&backup) {
            tracing::warn!(
                "Keeping existing {} from an unfinished rebuild",
                backup
            );
        } else if self.blobs.exists(&self.path) {
            // Pending batched writes belong to the state being replaced.
            if self.pending_persist {
                self.persist()?;
            }
            self.blobs.copy(&self.path, &backup)?;
            tracing::info!("Backed up {} to {}", self.path, backup);
        }

        self.clear_memory();
        self.mark_mutated()
    }

    fn requires_rebuild(&self) -> bool {
        self.requires_rebuild
    }

    fn stats(&self) -> IndexStats {
        let documents: HashSet<&str> = self
            .records
            .values()
            .map(|record| record.file_path.as_str())
            .collect();
        let (provider, model) = self.provider_label();

        IndexStats {
            documents: documents.len(),
            chunks: self.count(),
            dimension: self.dimension,
            provider,
            model,
            requires_rebuild: self.requires_rebuild,
        }
    }

    fn batch_persistence(&mut self) -> Option<&mut dyn BatchPersistence> {
        Some(self)
    }

    fn rebuild_backup(&mut self) -> Option<&mut dyn RebuildBackup> {
        Some(self)
    }
}

impl BatchPersistence for JsonVectorIndex {
    fn set_batch_mode(&mut self, enabled: bool) {
        tracing::debug!("Batch mode {}", if enabled { "on" } else { "off" });
        self.batch_mode = enabled;
    }

    fn is_batch_mode(&self) -> bool {
        self.batch_mode
    }

    fn flush_pending_persist(&mut self) -> AppResult<()> {
        if self.pending_persist {
            self.persist()?;
        }
        Ok(())
    }
}

impl RebuildBackup for JsonVectorIndex {
    fn has_backup(&self) -> bool {
        self.blobs.exists(&self.backup_path())
    }

    fn restore_from_backup(&mut self) -> AppResult<bool> {
        let backup = self.backup_path();
        let Some(raw) = self.blobs.read(&backup)? else {
            return Ok(false);
        };

        let stored: StoredIndex = serde_json::from_str(&raw)
            .map_err(|e| AppError::Corrupted(format!("Unreadable {}: {}", backup, e)))?;
        if stored.dimension != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: stored.dimension,
            });
        }
        let previous_model = self.install(stored)?;

        self.blobs.copy(&backup, &self.path)?;
        self.blobs.remove(&backup)?;
        self.pending_persist = false;
        self.mutations_since_persist = 0;
        self.requires_rebuild = previous_model.is_some();

        tracing::info!("Restored {} records from {}", self.records.len(), backup);
        Ok(true)
    }

    fn delete_backup(&mut self) -> AppResult<()> {
        self.blobs.remove(&self.backup_path())?;
        self.requires_rebuild = false;
        Ok(())
    }
}

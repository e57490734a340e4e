//! Local incremental semantic search over a note vault.
//!
//! Documents are split into content-addressed chunks, embedded through a
//! pluggable provider and kept in a vector index that answers hybrid
//! (term + vector) queries. [`IndexSyncManager`] keeps the chunk store and the
//! index in step with the vault: diff-based sync, full rebuild with rollback,
//! and single-file updates.

pub mod blob_index;
pub mod chunk;
pub mod chunk_store;
pub mod config;
pub mod embeddings;
pub mod notice;
pub mod pause;
pub mod progress;
pub mod search;
pub mod source;
pub mod storage;
pub mod sync;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use blob_index::JsonVectorIndex;
pub use chunk::{ChunkConfig, ChunkStrategy};
pub use chunk_store::ChunkStore;
pub use config::IndexSettings;
pub use embeddings::{EmbeddingConfig, EmbeddingProvider, Embedder};
pub use notice::{Notice, NoticeSink};
pub use pause::PauseHandle;
pub use progress::{ProgressEvent, ProgressReporter, SyncPhase};
pub use source::{DocumentSource, FsVault, MemoryVault};
pub use storage::{BlobStore, FsBlobStore};
pub use sync::IndexSyncManager;
pub use types::{Chunk, IndexStats, RebuildSummary, SearchHit, SyncSummary};
pub use vector_index::{IndexStatus, LoadOutcome, VectorIndex};

use std::path::PathBuf;
use std::sync::Arc;
use vaultsearch_core::{AppConfig, AppResult};

/// The engine as wired for a directory-backed vault.
pub type VaultIndex = IndexSyncManager<JsonVectorIndex>;

/// Everything needed to open an index, resolved from configuration.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub vault: PathBuf,
    pub data_dir: PathBuf,
    pub settings: IndexSettings,
    pub embedding: EmbeddingConfig,
}

impl OpenOptions {
    /// Resolve options from the application config and its YAML file.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        let config_path = config.config_path();
        let settings = IndexSettings::load(&config_path)?;
        let embedding = EmbeddingConfig::load(&config_path)?;

        Ok(Self {
            vault: config.vault.clone(),
            data_dir: config.data_dir(),
            settings,
            embedding,
        })
    }
}

/// Open and initialize the index for a vault.
pub async fn open(
    options: OpenOptions,
    progress: ProgressReporter,
    notices: NoticeSink,
) -> AppResult<VaultIndex> {
    tracing::info!(
        "Opening index for {:?} (data in {:?}, provider '{}')",
        options.vault,
        options.data_dir,
        options.embedding.provider
    );

    std::fs::create_dir_all(&options.data_dir)?;
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&options.data_dir)?);

    let provider = embeddings::create_provider(&options.embedding)?;
    let embedder = Embedder::new(provider, &options.embedding);

    let index = JsonVectorIndex::new(blobs.clone(), embedder)
        .with_weights(options.settings.weights())
        .with_flush_interval(options.settings.flush_interval)
        .with_notices(notices.clone());
    let store = ChunkStore::new(blobs, config::CHUNK_STORE_BLOB);
    let vault = FsVault::new(&options.vault).with_extensions(options.settings.extensions.clone());
    tracing::debug!("Scanning {:?} for {:?}", vault.root(), options.settings.extensions);
    let source: Arc<dyn DocumentSource> = Arc::new(vault);

    let mut manager = IndexSyncManager::new(source, store, index, options.settings.chunk_config())
        .with_rebuild_batch_size(options.settings.rebuild_batch_size)
        .with_progress(progress)
        .with_notices(notices);

    let status = manager.initialize().await?;
    tracing::info!(
        "Index ready: {} chunks, dimension {} ({:?})",
        status.count,
        status.dimension,
        status.outcome
    );
    Ok(manager)
}

/// Open the index described by the application config.
pub async fn open_from_config(
    config: &AppConfig,
    progress: ProgressReporter,
    notices: NoticeSink,
) -> AppResult<VaultIndex> {
    config.ensure_data_dir()?;
    open(OpenOptions::from_config(config)?, progress, notices).await
}

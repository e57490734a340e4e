//! Index settings and data-directory layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vaultsearch_core::{AppError, AppResult};

use crate::chunk::{ChunkConfig, ChunkStrategy, DEFAULT_MAX_CHUNKS};
use crate::search::{HybridWeights, MIN_SIMILARITY};
use crate::source::DEFAULT_EXTENSIONS;

/// Blob holding the chunk store.
pub const CHUNK_STORE_BLOB: &str = "chunks.json";

/// Index settings (the `index` section of config.yaml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    pub strategy: ChunkStrategy,

    /// Window size in characters (fixed strategy)
    pub chunk_size: usize,

    /// Window overlap in characters (fixed strategy)
    pub chunk_overlap: usize,

    pub max_chunks_per_document: usize,

    /// Default number of query results
    pub top_k: usize,

    pub vector_weight: f32,
    pub text_weight: f32,

    /// Cosine similarity below this contributes nothing to a hit
    pub min_similarity: f32,

    /// Chunks per index call during a rebuild
    pub rebuild_batch_size: usize,

    /// Mutations between writes while a rebuild defers persistence
    pub flush_interval: usize,

    /// File extensions treated as documents
    pub extensions: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Structured,
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks_per_document: DEFAULT_MAX_CHUNKS,
            top_k: 10,
            vector_weight: 0.7,
            text_weight: 0.3,
            min_similarity: MIN_SIMILARITY,
            rebuild_batch_size: 100,
            flush_interval: 10,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexSection {
    index: Option<IndexSettings>,
}

impl IndexSettings {
    /// Load the `index` section from a config file, or defaults.
    pub fn load(config_path: &Path) -> AppResult<Self> {
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {:?}, using default index settings",
                config_path
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let section: IndexSection = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        let settings = section.index.unwrap_or_default();
        settings.validate()?;
        tracing::debug!("Loaded index settings from {:?}", config_path);
        Ok(settings)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config(
                "index.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.vector_weight < 0.0 || self.text_weight < 0.0 {
            return Err(AppError::Config(
                "index weights must not be negative".to_string(),
            ));
        }
        if self.vector_weight + self.text_weight <= 0.0 {
            return Err(AppError::Config(
                "index.vector_weight + index.text_weight must be positive".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(AppError::Config(
                "index.extensions must name at least one extension".to_string(),
            ));
        }
        if self.rebuild_batch_size == 0 {
            return Err(AppError::Config(
                "index.rebuild_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_chunks_per_document == 0 {
            return Err(AppError::Config(
                "index.max_chunks_per_document must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            strategy: self.strategy,
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            max_chunks: self.max_chunks_per_document,
        }
    }

    pub fn weights(&self) -> HybridWeights {
        HybridWeights {
            vector_weight: self.vector_weight,
            text_weight: self.text_weight,
            min_similarity: self.min_similarity,
        }
    }
}

/// Path of the chunk store blob inside a data directory.
pub fn get_chunk_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CHUNK_STORE_BLOB)
}

/// Path of the index blob inside a data directory.
pub fn get_index_path(data_dir: &Path) -> PathBuf {
    data_dir.join(crate::blob_index::INDEX_BLOB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_settings() {
        let temp = TempDir::new().unwrap();
        let settings = IndexSettings::load(&temp.path().join("config.yaml")).unwrap();

        assert_eq!(settings, IndexSettings::default());
        assert_eq!(settings.rebuild_batch_size, 100);
        assert_eq!(settings.weights().vector_weight, 0.7);
    }

    #[test]
    fn test_load_partial_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "index:\n  strategy: fixed\n  chunk_size: 400\n  top_k: 3\nembedding:\n  provider: mock\n",
        )
        .unwrap();

        let settings = IndexSettings::load(&path).unwrap();
        assert_eq!(settings.strategy, ChunkStrategy::Fixed);
        assert_eq!(settings.chunk_config().chunk_size, 400);
        assert_eq!(settings.chunk_config().overlap, 200);
        assert_eq!(settings.top_k, 3);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let settings = IndexSettings {
            vector_weight: 0.0,
            text_weight: 0.0,
            ..IndexSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = IndexSettings {
            rebuild_batch_size: 0,
            ..IndexSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/vault/.vaultsearch");
        assert_eq!(get_index_path(dir), dir.join("index.json"));
        assert_eq!(get_chunk_store_path(dir), dir.join("chunks.json"));
    }
}

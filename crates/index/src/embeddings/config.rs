//! Embedding configuration types and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vaultsearch_core::{AppError, AppResult};

/// Embedding configuration (the `embedding` section of config.yaml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "mock", "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Declared embedding dimension; probed from the provider when absent
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Maximum texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Inputs longer than this many characters are split and mean-pooled
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Attempts per batch before the operation fails
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on each further retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Batches in flight at once, when the provider allows it
    #[serde(default = "default_concurrent_batches")]
    pub concurrent_batches: usize,

    /// Provider-specific configuration (JSON object)
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_max_input_chars() -> usize {
    8000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_concurrent_batches() -> usize {
    1
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: Some(384),
            batch_size: default_batch_size(),
            max_input_chars: default_max_input_chars(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            concurrent_batches: default_concurrent_batches(),
            provider_config: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingSection {
    embedding: Option<EmbeddingConfig>,
}

impl EmbeddingConfig {
    /// Load the `embedding` section from a config file, or defaults.
    pub fn load(config_path: &Path) -> AppResult<Self> {
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {:?}, using default embedding config",
                config_path
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let section: EmbeddingSection = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        let config = section.embedding.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the batching engine cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Config(
                "embedding.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(AppError::Config(
                "embedding.max_input_chars must be at least 1".to_string(),
            ));
        }
        if self.dimensions == Some(0) {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

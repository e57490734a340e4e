//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{MockProvider, OllamaProvider, TrigramProvider};
use std::sync::Arc;
use vaultsearch_core::{AppError, AppResult};

/// Fallback dimension for local providers without a declared one.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding providers.
///
/// A provider maps a batch of texts to a batch of equally long vectors.
/// Failures should be reported as [`AppError::Embedding`] with `retryable`
/// set for transient conditions (network hiccups, rate limits).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Dimension declared by configuration or the model, if known.
    fn declared_dimensions(&self) -> Option<usize>;

    /// Dimension the provider always produces, regardless of declared settings.
    fn fixed_dimensions(&self) -> Option<usize> {
        None
    }

    /// Maximum texts per `embed_batch` call.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }

    /// Maximum characters per text, if the provider imposes one.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }

    /// Number of batches that may be submitted concurrently.
    fn max_concurrent_batches(&self) -> usize {
        1
    }

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::fatal_embedding("No embedding returned"))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(
            config.model.clone(),
            config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        ))),

        "mock" => Ok(Arc::new(MockProvider::new(
            config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        ))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, mock, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let config = EmbeddingConfig {
            model: "trigram-v1".to_string(),
            dimensions: Some(128),
            ..EmbeddingConfig::default()
        };

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.declared_dimensions(), Some(128));
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..EmbeddingConfig::default()
        };

        let result = create_provider(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}

//! Ollama Embedding Provider
//!
//! Provides semantic embeddings via Ollama's local API using models like nomic-embed-text.
//!
//! # Features
//! - Neural semantic embeddings
//! - Local-first (no API costs, privacy-preserving)
//! - Native batch endpoint (`/api/embed`)
//! - Failures classified as retryable (connection, timeout, 429, 5xx) or not
//!
//! Retries are not performed here; the batching engine owns the retry policy.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use vaultsearch_core::{AppError, AppResult};

/// Ollama API endpoint for embeddings
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Inputs per request accepted without complaint by common embedding models
const MAX_BATCH: usize = 32;

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    /// Declared embedding dimension, probed when absent
    dimensions: Option<usize>,
}

/// Request payload for Ollama embed API
#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from Ollama embed API
#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Error response from Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create new Ollama provider with configuration.
    ///
    /// The base URL comes from `provider_config.url`, then `OLLAMA_URL`,
    /// then the local default.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .provider_config
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn classify_status(status: StatusCode, detail: String) -> AppError {
        let message = format!("Ollama API error ({}): {}", status, detail);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            AppError::transient(message)
        } else {
            AppError::fatal_embedding(message)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn declared_dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        debug!("Sending embed request for {} texts to {}", texts.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                let message = format!("Failed to send request to Ollama: {}", e);
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    AppError::transient(message)
                } else {
                    AppError::fatal_embedding(message)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let detail = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);

            return Err(Self::classify_status(status, detail));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            AppError::fatal_embedding(format!("Failed to parse Ollama response: {}", e))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(AppError::fatal_embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_url_from_provider_config() {
        let config = EmbeddingConfig {
            provider_config: serde_json::json!({"url": "http://gpu-box:11434/"}),
            ..create_test_config()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://gpu-box:11434");
        assert_eq!(provider.declared_dimensions(), None);
        assert_eq!(provider.max_batch_size(), MAX_BATCH);
    }

    #[test]
    fn test_status_classification() {
        let rate_limited =
            OllamaProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(rate_limited.is_retryable());

        let unavailable =
            OllamaProvider::classify_status(StatusCode::SERVICE_UNAVAILABLE, "loading".into());
        assert!(unavailable.is_retryable());

        let missing_model =
            OllamaProvider::classify_status(StatusCode::NOT_FOUND, "model not found".into());
        assert!(!missing_model.is_retryable());
    }

    #[tokio::test]
    async fn test_embed_batch_live() {
        if !is_ollama_running().await {
            println!("Skipping test: Ollama not running");
            return;
        }

        let provider = OllamaProvider::new(&create_test_config()).unwrap();
        let texts = vec!["First text".to_string(), "Second text".to_string()];
        let embeddings = match provider.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                println!("Skipping test: model unavailable ({})", e);
                return;
            }
        };

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), embeddings[1].len());
        assert!(embeddings[0].iter().any(|&x| x != 0.0));
    }

    /// Helper to check if Ollama is running
    async fn is_ollama_running() -> bool {
        let Ok(client) = Client::builder().timeout(Duration::from_secs(2)).build() else {
            return false;
        };
        let base = std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        client
            .get(format!("{}/api/tags", base))
            .send()
            .await
            .is_ok()
    }
}

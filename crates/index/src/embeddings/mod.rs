//! Embedding engine.
//!
//! Wraps a provider with the policies the index relies on: bounded batch
//! sizes, splitting of overlong inputs (mean-pooled back into one vector),
//! retry with exponential backoff for transient failures, per-batch progress
//! and dimension discovery.

pub mod batching;
pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use vaultsearch_core::{AppError, AppResult};

/// Callback invoked after each embedding batch with `(completed, total)`.
pub type EmbedProgress = dyn Fn(usize, usize) + Send + Sync;

/// Text embedded to discover the dimension of a provider.
const PROBE_TEXT: &str = "dimension probe";

/// Retry policy for provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Batching, retrying front-end to an [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_input_chars: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl Embedder {
    /// Build an embedder, combining configured limits with provider limits.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        let batch_size = config.batch_size.min(provider.max_batch_size()).max(1);
        let max_input_chars = provider
            .max_input_chars()
            .map_or(config.max_input_chars, |limit| limit.min(config.max_input_chars))
            .max(1);
        let concurrency = config
            .concurrent_batches
            .min(provider.max_concurrent_batches())
            .max(1);

        Self {
            provider,
            batch_size,
            max_input_chars,
            concurrency,
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            },
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolve the output dimension of the provider.
    ///
    /// A fixed provider dimension wins over a declared one; without either
    /// the provider is probed with a short sentinel text.
    pub async fn resolve_dimension(&self) -> AppResult<usize> {
        if let Some(fixed) = self.provider.fixed_dimensions() {
            tracing::debug!(
                "Provider '{}' uses fixed dimension {}",
                self.provider.provider_name(),
                fixed
            );
            return Ok(fixed);
        }

        if let Some(declared) = self.provider.declared_dimensions() {
            return Ok(declared);
        }

        let probe = self.embed_batch_with_retry(&[PROBE_TEXT.to_string()]).await?;
        let dimension = probe.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(AppError::fatal_embedding(format!(
                "Provider '{}' returned an empty probe embedding",
                self.provider.provider_name()
            )));
        }

        tracing::info!(
            "Probed embedding dimension {} for model '{}'",
            dimension,
            self.provider.model_name()
        );
        Ok(dimension)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()], None).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::fatal_embedding("No embedding returned"))
    }

    /// Embed texts in bounded batches, one vector per input text.
    pub async fn embed_texts(
        &self,
        texts: &[String],
        progress: Option<&EmbedProgress>,
    ) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut pieces = Vec::with_capacity(texts.len());
        let mut owners = Vec::with_capacity(texts.len());
        for (owner, text) in texts.iter().enumerate() {
            for piece in batching::split_for_embedding(text, self.max_input_chars) {
                pieces.push(piece);
                owners.push(owner);
            }
        }

        let batches: Vec<&[String]> = pieces.chunks(self.batch_size).collect();
        let total = batches.len();

        tracing::debug!(
            "Embedding {} texts ({} pieces) in {} batches with '{}'",
            texts.len(),
            pieces.len(),
            total,
            self.provider.provider_name()
        );

        // Collected up front so the stream type carries no closure over `&[String]`.
        let calls: Vec<_> = batches
            .into_iter()
            .map(|batch| self.embed_batch_with_retry(batch))
            .collect();
        let mut results = stream::iter(calls).buffered(self.concurrency);

        let mut vectors = Vec::with_capacity(pieces.len());
        let mut completed = 0;
        while let Some(batch) = results.next().await {
            vectors.extend(batch?);
            completed += 1;
            if let Some(progress) = progress {
                progress(completed, total);
            }
        }

        let mut grouped: Vec<Vec<Vec<f32>>> = vec![Vec::new(); texts.len()];
        for (owner, vector) in owners.into_iter().zip(vectors) {
            grouped[owner].push(vector);
        }

        Ok(grouped
            .into_iter()
            .map(|mut parts| {
                if parts.len() == 1 {
                    parts.pop().unwrap_or_default()
                } else {
                    batching::mean_pool(&parts)
                }
            })
            .collect())
    }

    async fn embed_batch_with_retry(&self, batch: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => {
                    validate_batch(batch.len(), &vectors)?;
                    return Ok(vectors);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    tracing::warn!(
                        "Embedding batch failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        self.retry.max_attempts,
                        backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Embedding batch of {} failed after {} attempt(s): {}",
                        batch.len(),
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn validate_batch(expected: usize, vectors: &[Vec<f32>]) -> AppResult<()> {
    if vectors.len() != expected {
        return Err(AppError::fatal_embedding(format!(
            "Provider returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() || vectors.iter().any(|v| v.len() != first.len()) {
            return Err(AppError::fatal_embedding(
                "Provider returned vectors of inconsistent length",
            ));
        }
    }
    Ok(())
}

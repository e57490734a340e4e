//! Instrumented mock provider for tests.

use crate::embeddings::provider::EmbeddingProvider;
use crate::embeddings::providers::trigram::trigram_embedding;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use vaultsearch_core::{AppError, AppResult};

/// Mock provider for testing and development.
///
/// Produces the same deterministic vectors as the trigram provider and
/// records every call, so tests can assert how much embedding work an
/// operation triggered. Failures can be injected: a number of transient
/// (retryable) failures, or a fatal failure once a call budget is spent.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    fixed: bool,
    max_batch: usize,
    max_chars: Option<usize>,
    calls: AtomicUsize,
    transient_failures: AtomicUsize,
    fail_after: Mutex<Option<usize>>,
    embedded: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            fixed: false,
            max_batch: usize::MAX,
            max_chars: None,
            calls: AtomicUsize::new(0),
            transient_failures: AtomicUsize::new(0),
            fail_after: Mutex::new(None),
            embedded: Mutex::new(Vec::new()),
        }
    }

    /// Report `dimensions` as a non-configurable dimension.
    pub fn with_fixed_dimensions(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn with_max_input_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars.max(1));
        self
    }

    /// Fail the next `count` calls with a retryable error.
    pub fn fail_transiently(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every call once `calls` successful calls have been made.
    pub fn fail_after_calls(&self, calls: usize) {
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = Some(self.call_count() + calls);
        }
    }

    /// Remove injected failures.
    pub fn clear_failures(&self) {
        self.transient_failures.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = None;
        }
    }

    /// Number of successful `embed_batch` calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text embedded so far, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.embedded.lock() {
            guard.clear();
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-trigram"
    }

    fn declared_dimensions(&self) -> Option<usize> {
        if self.fixed {
            None
        } else {
            Some(self.dimensions)
        }
    }

    fn fixed_dimensions(&self) -> Option<usize> {
        self.fixed.then_some(self.dimensions)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_chars
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(AppError::transient("mock provider: simulated rate limit"));
        }

        let budget = self.fail_after.lock().map(|g| *g).unwrap_or(None);
        if let Some(limit) = budget {
            if self.call_count() >= limit {
                return Err(AppError::fatal_embedding("mock provider: simulated outage"));
            }
        }

        if texts.len() > self.max_batch {
            return Err(AppError::fatal_embedding(format!(
                "mock provider: batch of {} exceeds limit {}",
                texts.len(),
                self.max_batch
            )));
        }
        if let Some(max_chars) = self.max_chars {
            if texts.iter().any(|t| t.chars().count() > max_chars) {
                return Err(AppError::fatal_embedding(
                    "mock provider: input exceeds max length",
                ));
            }
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.embedded.lock() {
            guard.extend(texts.iter().cloned());
        }

        Ok(texts
            .iter()
            .map(|text| trigram_embedding(text, self.dimensions))
            .collect())
    }
}

//! Trigram embedding provider using character trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use std::collections::{HashMap, HashSet};
use vaultsearch_core::AppResult;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings based on text content using
/// character trigrams and word frequencies. While not semantically
/// accurate like neural embedding models, it produces consistent,
/// content-dependent vectors suitable for development and offline use.
#[derive(Debug)]
pub struct TrigramProvider {
    model: String,
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions: dimensions.max(1),
        }
    }
}

/// Hash words and their character trigrams into a unit vector.
pub(crate) fn trigram_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut embedding = vec![0.0; dimensions];
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

    let lower = text.to_lowercase();
    let mut word_freq: HashMap<&str, u32> = HashMap::new();
    for word in lower
        .split_whitespace()
        .filter(|w| !stop_words.contains(w) && w.len() > 2)
    {
        *word_freq.entry(word).or_insert(0) += 1;
    }

    for (word, freq) in &word_freq {
        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let trigram_hash = window.iter().collect::<String>().bytes().fold(0u64, |acc, b| {
                acc.wrapping_mul(37).wrapping_add(b as u64)
            });
            embedding[(trigram_hash as usize) % dimensions] += (*freq as f32).sqrt();
        }

        let word_hash = word
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        embedding[(word_hash as usize) % dimensions] += *freq as f32;
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn declared_dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| trigram_embedding(text, self.dimensions))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_trigram_embed_batch() {
        let provider = TrigramProvider::new("trigram-v1", 384);
        let texts = vec![
            "hello world".to_string(),
            "test embedding".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[tokio::test]
    async fn test_trigram_deterministic() {
        let provider = TrigramProvider::new("trigram-v1", 64);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, provider.embed("another sentence").await.unwrap());
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = trigram_embedding("", 32);
        assert_eq!(embedding.len(), 32);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_utf8_safety() {
        let embedding = trigram_embedding("Acentuação: ã, õ, ç 🎮 brasileiro", 128);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}

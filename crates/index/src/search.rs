//! Hybrid ranking: BM25 term matching blended with cosine similarity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::{IndexedChunk, SearchHit};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// Minimum cosine similarity for the vector signal to count.
pub const MIN_SIMILARITY: f32 = 0.20;

/// Blend of the text and vector signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub vector_weight: f32,
    pub text_weight: f32,
    pub min_similarity: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            text_weight: 0.3,
            min_similarity: MIN_SIMILARITY,
        }
    }
}

/// Lowercased word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Inverted term statistics over indexed chunks.
///
/// Kept in memory only and rebuilt from the records on load.
#[derive(Debug, Default, Clone)]
pub struct TermIndex {
    term_freqs: HashMap<String, HashMap<String, u32>>,
    doc_lengths: HashMap<String, usize>,
    doc_freqs: HashMap<String, usize>,
    total_length: usize,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `content` under `id`, replacing any previous entry.
    pub fn insert(&mut self, id: &str, content: &str) {
        self.remove(id);

        let tokens = tokenize(content);
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *freqs.entry(token.clone()).or_insert(0) += 1;
        }
        for term in freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.total_length += tokens.len();
        self.doc_lengths.insert(id.to_string(), tokens.len());
        self.term_freqs.insert(id.to_string(), freqs);
    }

    pub fn remove(&mut self, id: &str) {
        let Some(freqs) = self.term_freqs.remove(id) else {
            return;
        };
        for term in freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
        }
        if let Some(len) = self.doc_lengths.remove(id) {
            self.total_length -= len;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_freqs.is_empty()
    }

    /// BM25 scores for `query`, scaled so the best match is 1.0.
    pub fn scores(&self, query: &str) -> HashMap<String, f32> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        let n = self.term_freqs.len() as f32;
        if n == 0.0 || terms.is_empty() {
            return HashMap::new();
        }
        let avg_len = (self.total_length as f32 / n).max(1.0);

        let mut scores: HashMap<String, f32> = HashMap::new();
        for term in &terms {
            let Some(&df) = self.doc_freqs.get(term) else {
                continue;
            };
            let idf = ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln();

            for (id, freqs) in &self.term_freqs {
                let Some(&tf) = freqs.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let len = self.doc_lengths.get(id).copied().unwrap_or(0) as f32;
                let norm = tf * (BM25_K1 + 1.0)
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len));
                *scores.entry(id.clone()).or_insert(0.0) += idf * norm;
            }
        }

        let max = scores.values().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for score in scores.values_mut() {
                *score /= max;
            }
        }
        scores
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank records by the weighted blend of text and vector scores.
///
/// Vector similarity below the floor contributes nothing; records with no
/// remaining signal are dropped.
pub fn hybrid_rank<'a>(
    records: impl Iterator<Item = &'a IndexedChunk>,
    query_vector: &[f32],
    text_scores: &HashMap<String, f32>,
    weights: &HybridWeights,
    top_k: usize,
) -> Vec<SearchHit> {
    let mut results: Vec<(&IndexedChunk, f32)> = records
        .filter_map(|record| {
            let similarity = cosine_similarity(query_vector, &record.embedding);
            let vector = if similarity >= weights.min_similarity {
                similarity
            } else {
                0.0
            };
            let text = text_scores.get(&record.id).copied().unwrap_or(0.0);
            let score = weights.vector_weight * vector + weights.text_weight * text;
            (score > 0.0).then_some((record, score))
        })
        .collect();

    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    results.truncate(top_k);

    results
        .into_iter()
        .map(|(record, score)| record.to_hit(score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, content: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            id: id.to_string(),
            file_path: "a.md".to_string(),
            chunk_index: 0,
            content_hash: String::new(),
            content: content.to_string(),
            timestamp: 0,
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_bm25_prefers_matching_terms() {
        let mut terms = TermIndex::new();
        terms.insert("a", "rust ownership and borrowing");
        terms.insert("b", "gardening tips for spring");
        terms.insert("c", "rust rust compiler");

        let scores = terms.scores("Rust");
        assert!(!scores.contains_key("b"));
        assert_eq!(scores.values().cloned().fold(0.0, f32::max), 1.0);
        assert!(scores["c"] >= scores["a"]);
    }

    #[test]
    fn test_term_index_remove_and_replace() {
        let mut terms = TermIndex::new();
        terms.insert("a", "alpha beta");
        terms.insert("a", "gamma");
        assert_eq!(terms.len(), 1);
        assert!(terms.scores("alpha").is_empty());
        assert!(terms.scores("gamma").contains_key("a"));

        terms.remove("a");
        assert!(terms.is_empty());
        assert!(terms.scores("gamma").is_empty());
    }

    #[test]
    fn test_hybrid_rank_blends_and_floors() {
        let records = [
            record("x", "unrelated", vec![1.0, 0.0]),
            record("y", "keyword", vec![0.0, 1.0]),
            record("z", "nothing", vec![0.1, -1.0]),
        ];
        let mut text = HashMap::new();
        text.insert("y".to_string(), 1.0);

        let hits = hybrid_rank(
            records.iter(),
            &[1.0, 0.0],
            &text,
            &HybridWeights::default(),
            10,
        );

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!((hits[0].score - 0.7).abs() < 1e-6);
        assert!((hits[1].score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_rank_truncates() {
        let records: Vec<IndexedChunk> = (0..5)
            .map(|i| record(&format!("r{}", i), "", vec![1.0, 0.0]))
            .collect();
        let hits = hybrid_rank(
            records.iter(),
            &[1.0, 0.0],
            &HashMap::new(),
            &HybridWeights::default(),
            2,
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "r0");
    }
}

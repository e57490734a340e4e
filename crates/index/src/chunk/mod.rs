//! Document chunking.
//!
//! Splits a document into an ordered list of chunk contents using one of two
//! interchangeable strategies:
//! - fixed-size sliding windows with overlap
//! - heading/paragraph structured splitting
//!
//! Both are pure and deterministic: re-splitting unchanged text yields
//! byte-identical chunks, so content hashes stay stable across passes.

mod fixed;
mod structured;

pub use fixed::FixedSizeSplitter;
pub use structured::StructuredSplitter;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Chunk;

/// Chunk index reserved for content preceding the first heading.
pub const PREAMBLE_INDEX: i32 = -1;

/// Default hard cap on chunks produced for a single document.
pub const DEFAULT_MAX_CHUNKS: usize = 500;

/// Chunking strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Sliding window of `chunk_size` characters with `overlap`
    Fixed,
    /// One chunk per H1/H2 section, falling back to paragraphs
    Structured,
}

/// Configuration for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    pub strategy: ChunkStrategy,

    /// Window size in characters (fixed strategy only)
    pub chunk_size: usize,

    /// Overlap between windows in characters (fixed strategy only)
    pub overlap: usize,

    /// Hard cap on chunks per document
    pub max_chunks: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Fixed,
            chunk_size: 1000,
            overlap: 200,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

/// A piece of document text with its ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChunk {
    pub chunk_index: i32,
    pub content: String,
}

/// Trait for chunk splitters.
pub trait ChunkSplitter {
    /// Split text into ordered chunks.
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<SplitChunk>;
}

/// Split text with the configured strategy.
pub fn split(text: &str, config: &ChunkConfig) -> Vec<SplitChunk> {
    dispatch_splitter(config.strategy).split(text, config)
}

/// Split a document and build chunks carrying ids and hashes.
pub fn chunk_document(file_path: &str, text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = split(text, config)
        .into_iter()
        .map(|piece| Chunk::new(file_path, piece.chunk_index, piece.content))
        .collect();

    tracing::debug!(
        "Chunked {} into {} chunks ({:?})",
        file_path,
        chunks.len(),
        config.strategy
    );

    chunks
}

fn dispatch_splitter(strategy: ChunkStrategy) -> Box<dyn ChunkSplitter> {
    match strategy {
        ChunkStrategy::Fixed => Box::new(FixedSizeSplitter),
        ChunkStrategy::Structured => Box::new(StructuredSplitter),
    }
}

/// 128-bit content hash (truncated SHA-256), hex encoded.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Deterministic chunk id for a document ordinal.
pub fn chunk_id(file_path: &str, chunk_index: i32) -> String {
    format!("{}#{}", file_path, chunk_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_128_bit_hex() {
        let hash = content_hash("Hello, world!");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash("Hello, world!"));
        assert_ne!(hash, content_hash("Hello, world"));
    }

    #[test]
    fn test_chunk_id_includes_preamble_ordinal() {
        assert_eq!(chunk_id("a.md", 0), "a.md#0");
        assert_eq!(chunk_id("a.md", PREAMBLE_INDEX), "a.md#-1");
    }

    #[test]
    fn test_split_is_idempotent_for_both_strategies() {
        let text = "intro line\n\n# One\nalpha beta\n\n## Two\ngamma\n\n".repeat(20);
        for strategy in [ChunkStrategy::Fixed, ChunkStrategy::Structured] {
            let config = ChunkConfig {
                strategy,
                chunk_size: 64,
                overlap: 16,
                ..ChunkConfig::default()
            };
            assert_eq!(split(&text, &config), split(&text, &config));
        }
    }

    #[test]
    fn test_chunk_document_builds_ids() {
        let config = ChunkConfig {
            strategy: ChunkStrategy::Structured,
            ..ChunkConfig::default()
        };
        let chunks = chunk_document("a.md", "# A\ntext1\n\n# B\ntext2", &config);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md#0", "a.md#1"]);
        assert_eq!(chunks[0].content, "# A\ntext1");
        assert_eq!(chunks[1].content, "# B\ntext2");
    }
}

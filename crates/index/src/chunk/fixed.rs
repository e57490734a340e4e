//! Fixed-size sliding-window splitter.

use super::{ChunkConfig, ChunkSplitter, SplitChunk};

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one.
pub struct FixedSizeSplitter;

impl ChunkSplitter for FixedSizeSplitter {
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<SplitChunk> {
        // Byte offset of every char, plus the end of the text
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let total = offsets.len();
        if total == 0 {
            return Vec::new();
        }
        offsets.push(text.len());

        let max_chunks = config.max_chunks.max(1);
        let (size, overlap) = effective_window(total, config.chunk_size, config.overlap, max_chunks);
        let step = size - overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut window = 0i32;

        while start < total {
            let end = (start + size).min(total);
            let piece = text[offsets[start]..offsets[end]].trim();
            if !piece.is_empty() {
                chunks.push(SplitChunk {
                    chunk_index: window,
                    content: piece.to_string(),
                });
            }

            if end == total {
                break;
            }
            start += step;
            window += 1;
        }

        tracing::debug!(
            "Fixed splitter created {} chunks (size: {}, overlap: {}) from {} chars",
            chunks.len(),
            size,
            overlap,
            total
        );

        chunks
    }
}

/// Resolve the window actually used for a text of `total` characters.
///
/// Clamps a degenerate overlap to a quarter of the window and widens the
/// window (and overlap) proportionally when the document would otherwise
/// produce more than `max_chunks` windows.
fn effective_window(
    total: usize,
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> (usize, usize) {
    let size = chunk_size.max(1);
    let overlap = if overlap >= size {
        tracing::warn!(
            "Chunk overlap {} is not smaller than chunk size {}; clamping to {}",
            overlap,
            size,
            size / 4
        );
        size / 4
    } else {
        overlap
    };

    let windows = window_count(total, size, size - overlap);
    if windows <= max_chunks {
        return (size, overlap);
    }

    let mut factor = windows.div_ceil(max_chunks);
    while window_count(total, size * factor, (size - overlap) * factor) > max_chunks {
        factor += 1;
    }

    tracing::debug!(
        "Document of {} chars would produce {} chunks; widening window {}x",
        total,
        windows,
        factor
    );

    (size * factor, overlap * factor)
}

fn window_count(total: usize, size: usize, step: usize) -> usize {
    if total <= size {
        1
    } else {
        1 + (total - size).div_ceil(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkStrategy;

    fn config(chunk_size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            strategy: ChunkStrategy::Fixed,
            chunk_size,
            overlap,
            max_chunks: 500,
        }
    }

    #[test]
    fn test_no_overlap() {
        let text = "a".repeat(300);
        let chunks = FixedSizeSplitter.split(&text, &config(100, 0));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[2].chunk_index, 2);
        assert!(chunks.iter().all(|c| c.content.len() == 100));
    }

    #[test]
    fn test_windows_start_at_step_multiples() {
        let text: String = ('a'..='z').collect();
        let chunks = FixedSizeSplitter.split(&text, &config(10, 4));

        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "ghijklmnop");
        assert_eq!(chunks[2].content, "mnopqrstuv");
        assert_eq!(chunks[3].content, "stuvwxyz");
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_empty_and_whitespace_windows_dropped() {
        assert!(FixedSizeSplitter.split("", &config(10, 2)).is_empty());

        let text = format!("{}{}", " ".repeat(20), "tail");
        let chunks = FixedSizeSplitter.split(&text, &config(10, 0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "tail");
        assert_eq!(chunks[0].chunk_index, 2);
    }

    #[test]
    fn test_degenerate_overlap_is_clamped() {
        let text = "x".repeat(100);
        let chunks = FixedSizeSplitter.split(&text, &config(20, 50));
        // overlap clamps to 5, step 15
        assert_eq!(chunks.len(), 7);
    }

    #[test]
    fn test_chunk_count_capped_for_huge_documents() {
        let text = "word ".repeat(20_000);
        let capped = ChunkConfig {
            max_chunks: 50,
            ..config(100, 20)
        };
        let chunks = FixedSizeSplitter.split(&text, &capped);

        assert!(chunks.len() <= 50);
        // The tail of the document is still covered
        assert!(chunks.last().unwrap().content.ends_with("word"));
    }

    #[test]
    fn test_utf8_safety() {
        let text = "Acentuação: ã, õ, ç 🎮 🚀 ".repeat(40);
        let chunks = FixedSizeSplitter.split(&text, &config(37, 11));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 37);
        }
    }

    #[test]
    fn test_effective_window_passthrough() {
        assert_eq!(effective_window(1000, 100, 10, 500), (100, 10));
        assert_eq!(effective_window(10, 0, 0, 500), (1, 0));
    }
}

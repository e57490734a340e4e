//! Heading/paragraph structured splitter.

use super::{ChunkConfig, ChunkSplitter, SplitChunk, PREAMBLE_INDEX};

/// Splits markdown at H1/H2 headings.
///
/// Each heading-to-next-heading span becomes one chunk; text before the first
/// heading becomes the preamble chunk. Without headings the text is split at
/// blank lines, and without paragraph breaks the whole document is one chunk.
/// Headings and blank lines inside fenced code blocks are ignored.
pub struct StructuredSplitter;

impl ChunkSplitter for StructuredSplitter {
    fn split(&self, text: &str, config: &ChunkConfig) -> Vec<SplitChunk> {
        let max_chunks = config.max_chunks.max(1);
        let lines = scan_lines(text);

        let heading_starts: Vec<usize> = lines
            .iter()
            .filter(|line| line.is_heading)
            .map(|line| line.start)
            .collect();

        let chunks = if heading_starts.is_empty() {
            split_paragraphs(text, &lines, max_chunks)
        } else {
            split_sections(text, &heading_starts, max_chunks)
        };

        tracing::debug!(
            "Structured splitter created {} chunks ({} headings) from {} bytes",
            chunks.len(),
            heading_starts.len(),
            text.len()
        );

        chunks
    }
}

struct Line {
    start: usize,
    end: usize,
    is_heading: bool,
    is_blank: bool,
}

fn scan_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0;
    let mut in_fence = false;

    for raw in text.split_inclusive('\n') {
        let start = offset;
        offset += raw.len();
        let content = raw.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            lines.push(Line {
                start,
                end: offset,
                is_heading: false,
                is_blank: false,
            });
            continue;
        }

        lines.push(Line {
            start,
            end: offset,
            is_heading: !in_fence && is_top_heading(content),
            is_blank: !in_fence && trimmed.is_empty(),
        });
    }

    lines
}

/// `# Title` or `## Title` at the start of a line (ATX style).
fn is_top_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 2 {
        return false;
    }
    let rest = &line[hashes..];
    rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')
}

fn split_sections(text: &str, heading_starts: &[usize], max_chunks: usize) -> Vec<SplitChunk> {
    let preamble = text[..heading_starts[0]].trim();

    let mut sections = Vec::with_capacity(heading_starts.len());
    for (i, start) in heading_starts.iter().enumerate() {
        let end = heading_starts.get(i + 1).copied().unwrap_or(text.len());
        let section = text[*start..end].trim();
        if !section.is_empty() {
            sections.push(section);
        }
    }

    if preamble.is_empty() {
        return numbered(cap_pieces(sections, max_chunks));
    }

    // With a cap of one there is no room for a separate preamble chunk.
    if max_chunks == 1 {
        let mut pieces = vec![preamble];
        pieces.extend(sections);
        return numbered(cap_pieces(pieces, 1));
    }

    let mut chunks = vec![SplitChunk {
        chunk_index: PREAMBLE_INDEX,
        content: preamble.to_string(),
    }];
    chunks.extend(numbered(cap_pieces(sections, max_chunks - 1)));
    chunks
}

fn split_paragraphs(text: &str, lines: &[Line], max_chunks: usize) -> Vec<SplitChunk> {
    let mut paragraphs = Vec::new();
    let mut current: Option<(usize, usize)> = None;

    for line in lines {
        if line.is_blank {
            if let Some((start, end)) = current.take() {
                paragraphs.push(text[start..end].trim());
            }
        } else {
            current = Some(match current {
                Some((start, _)) => (start, line.end),
                None => (line.start, line.end),
            });
        }
    }
    if let Some((start, end)) = current {
        paragraphs.push(text[start..end].trim());
    }
    paragraphs.retain(|p| !p.is_empty());

    if paragraphs.len() <= 1 {
        let whole = text.trim();
        if whole.is_empty() {
            return Vec::new();
        }
        return vec![SplitChunk {
            chunk_index: 0,
            content: whole.to_string(),
        }];
    }

    numbered(cap_pieces(paragraphs, max_chunks))
}

/// Merge adjacent pieces so that at most `max` remain.
fn cap_pieces(pieces: Vec<&str>, max: usize) -> Vec<String> {
    if pieces.len() <= max {
        return pieces.into_iter().map(str::to_string).collect();
    }

    let group = pieces.len().div_ceil(max);
    tracing::debug!(
        "Merging {} sections in groups of {} to respect the {} chunk cap",
        pieces.len(),
        group,
        max
    );
    pieces.chunks(group).map(|g| g.join("\n\n")).collect()
}

fn numbered(pieces: Vec<String>) -> Vec<SplitChunk> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| SplitChunk {
            chunk_index: i as i32,
            content,
        })
        .collect()
}

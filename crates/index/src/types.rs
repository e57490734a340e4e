//! Index type definitions.

use serde::{Deserialize, Serialize};

use crate::chunk::{chunk_id, content_hash};

/// A contiguous slice of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Deterministic id derived from `(file_path, chunk_index)`
    pub id: String,

    /// Vault-relative path of the source document
    pub file_path: String,

    /// Ordinal within the document (`PREAMBLE_INDEX` for a structured preamble)
    pub chunk_index: i32,

    /// Hash of `content`, used only for change detection
    pub content_hash: String,

    /// Text content
    pub content: String,

    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Embedding vector, when already known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Build a chunk, deriving its id and content hash.
    pub fn new(file_path: &str, chunk_index: i32, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: chunk_id(file_path, chunk_index),
            file_path: file_path.to_string(),
            chunk_index,
            content_hash: content_hash(&content),
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
            embedding: None,
        }
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Metadata tracked by the chunk store for this chunk.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            content_hash: self.content_hash.clone(),
            file_path: self.file_path.clone(),
            chunk_index: self.chunk_index,
            timestamp: self.timestamp,
        }
    }
}

/// Last-known state of a chunk, persisted in the chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub content_hash: String,
    pub file_path: String,
    pub chunk_index: i32,
    pub timestamp: i64,
}

/// A chunk as stored by a vector index, always carrying its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedChunk {
    pub id: String,
    pub file_path: String,
    pub chunk_index: i32,
    pub content_hash: String,
    pub content: String,
    pub timestamp: i64,
    pub embedding: Vec<f32>,
}

impl IndexedChunk {
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            file_path: chunk.file_path,
            chunk_index: chunk.chunk_index,
            content_hash: chunk.content_hash,
            content: chunk.content,
            timestamp: chunk.timestamp,
            embedding,
        }
    }

    /// Convert into a ranked result.
    pub fn to_hit(&self, score: f32) -> SearchHit {
        SearchHit {
            id: self.id.clone(),
            file_path: self.file_path.clone(),
            chunk_index: self.chunk_index,
            content: self.content.clone(),
            score,
        }
    }
}

/// A document as listed by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Stable vault-relative path
    pub path: String,

    /// Modification marker (milliseconds since the Unix epoch)
    pub mtime: i64,
}

/// A ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub file_path: String,
    pub chunk_index: i32,
    pub content: String,
    pub score: f32,
}

/// A document that failed during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of an incremental sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<SyncError>,
    pub duration_ms: u64,
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub files: usize,
    pub chunks: usize,
    pub errors: Vec<SyncError>,
    pub duration_ms: u64,
}

/// Statistics for an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of distinct documents with chunks
    pub documents: usize,

    /// Number of indexed chunks
    pub chunks: usize,

    /// Embedding vector dimension
    pub dimension: usize,

    pub provider: String,
    pub model: String,

    /// Set when the index was reset or a rebuild was interrupted
    pub requires_rebuild: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_new_derives_id_and_hash() {
        let a = Chunk::new("notes/a.md", 0, "hello");
        let b = Chunk::new("notes/a.md", 0, "hello");
        assert_eq!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
        assert!(a.embedding.is_none());

        let c = Chunk::new("notes/a.md", 1, "hello");
        assert_ne!(a.id, c.id);
        assert_eq!(a.content_hash, c.content_hash);
    }

    #[test]
    fn test_chunk_serializes_camel_case() {
        let chunk = Chunk::new("a.md", 2, "text");
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["filePath"], "a.md");
        assert_eq!(json["chunkIndex"], 2);
        assert!(json.get("embedding").is_none());
    }
}

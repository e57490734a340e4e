//! Error types for vaultsearch.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! embedding providers, index persistence and synchronization failures.

use thiserror::Error;

/// Unified error type for vaultsearch.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic. Errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider errors, classified for the retry loop
    #[error("Embedding error: {message}")]
    Embedding { message: String, retryable: bool },

    /// Vector length disagrees with the index schema
    #[error(
        "Embedding dimension mismatch: index expects {expected}, got {actual}. \
         The embedding model changed; rebuild the index."
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted blob could not be parsed
    #[error("Index data is corrupted: {0}")]
    Corrupted(String),

    /// Vector index errors
    #[error("Index error: {0}")]
    Index(String),

    /// A single document could not be read or chunked
    #[error("Failed to process '{path}': {message}")]
    Document { path: String, message: String },

    /// A full rebuild failed and was rolled back
    #[error("Rebuild failed: {message} ({} document errors)", errors.len())]
    RebuildFailed { message: String, errors: Vec<String> },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Transient provider failure (network hiccup, rate limit).
    pub fn transient(message: impl Into<String>) -> Self {
        AppError::Embedding {
            message: message.into(),
            retryable: true,
        }
    }

    /// Provider failure that will not succeed on retry.
    pub fn fatal_embedding(message: impl Into<String>) -> Self {
        AppError::Embedding {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether retrying the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Embedding {
                retryable: true,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

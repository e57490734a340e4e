//! Human-readable notices for terminal outcomes.
//!
//! Progress events describe work in flight; notices describe what happened
//! to the index as a whole (reset after corruption, model change, rebuild
//! outcome) and are meant to be surfaced to the user.

use std::sync::Arc;

/// A terminal outcome worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The persisted index could not be parsed and was set aside.
    IndexCorrupted { backup: String },

    /// The embedding dimension changed; the old index was set aside.
    DimensionChanged {
        previous: usize,
        current: usize,
        backup: String,
    },

    /// Same dimension, different provider or model.
    ModelChanged { previous: String, current: String },

    /// A rebuild backup was found at startup. `restored` is set when the
    /// index was rolled back to it.
    InterruptedRebuild { restored: bool },

    RebuildSucceeded { files: usize, chunks: usize },

    RebuildFailed {
        message: String,
        errors: usize,
        restored: bool,
    },
}

impl Notice {
    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            Notice::IndexCorrupted { backup } => format!(
                "Search index was corrupted and has been reset (old data saved to {}). Rebuild the index.",
                backup
            ),
            Notice::DimensionChanged {
                previous,
                current,
                backup,
            } => format!(
                "Embedding dimension changed from {} to {}. The old index was saved to {}; rebuild the index.",
                previous, current, backup
            ),
            Notice::ModelChanged { previous, current } => format!(
                "Embedding model changed from {} to {}. Results may be inconsistent until the index is rebuilt.",
                previous, current
            ),
            Notice::InterruptedRebuild { restored: true } => {
                "A previous rebuild did not finish. The last complete index was restored."
                    .to_string()
            }
            Notice::InterruptedRebuild { restored: false } => {
                "A previous rebuild did not finish. Rebuild the index to make search results complete."
                    .to_string()
            }
            Notice::RebuildSucceeded { files, chunks } => {
                format!("Rebuilt search index: {} chunks from {} files.", chunks, files)
            }
            Notice::RebuildFailed {
                message,
                errors,
                restored,
            } => {
                let state = if *restored {
                    "The previous index was restored."
                } else {
                    "No previous index could be restored."
                };
                format!(
                    "Rebuild failed: {} ({} document errors). {}",
                    message, errors, state
                )
            }
        }
    }

    /// Whether the index needs a rebuild after this outcome.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            Notice::IndexCorrupted { .. }
                | Notice::DimensionChanged { .. }
                | Notice::ModelChanged { .. }
                | Notice::InterruptedRebuild { restored: false }
        )
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Consumer of notices.
#[derive(Clone, Default)]
pub struct NoticeSink {
    callback: Option<Arc<dyn Fn(&Notice) + Send + Sync>>,
}

impl NoticeSink {
    pub fn new(callback: Arc<dyn Fn(&Notice) + Send + Sync>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Sink that only logs.
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn notify(&self, notice: Notice) {
        if notice.requires_rebuild() {
            tracing::warn!("{}", notice);
        } else {
            tracing::info!("{}", notice);
        }
        if let Some(callback) = &self.callback {
            callback(&notice);
        }
    }
}

//! Structured progress reporting for sync and rebuild.
//!
//! Provides observable, incremental feedback during long-running operations.
//! During indexing, progress advances per embedding sub-batch since that is
//! where most of the wall-clock time goes.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Phase of a sync or rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Scanning,
    Processing,
    Indexing,
    Finalizing,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Scanning => "scanning",
            SyncPhase::Processing => "processing",
            SyncPhase::Indexing => "indexing",
            SyncPhase::Finalizing => "finalizing",
        }
    }
}

/// Progress event emitted during sync operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: SyncPhase,

    /// Document being processed, if any
    pub current_file: Option<String>,

    pub current_file_index: usize,
    pub total_files: usize,

    /// Chunks indexed so far (indexing phase)
    pub current_chunk: Option<usize>,
    pub total_chunks: Option<usize>,

    /// Elapsed time since the operation started
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(phase: SyncPhase, current_file_index: usize, total_files: usize) -> Self {
        Self {
            phase,
            current_file: None,
            current_file_index,
            total_files,
            current_chunk: None,
            total_chunks: None,
            elapsed_secs: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.current_file = Some(path.into());
        self
    }

    pub fn with_chunks(mut self, current: usize, total: usize) -> Self {
        self.current_chunk = Some(current);
        self.total_chunks = Some(total);
        self
    }

    /// Set elapsed time.
    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Percentage complete within the current phase.
    pub fn percentage(&self) -> Option<f64> {
        match (self.current_chunk, self.total_chunks) {
            (Some(current), Some(total)) if total > 0 => {
                Some(current as f64 / total as f64 * 100.0)
            }
            _ if self.total_files > 0 => {
                Some(self.current_file_index as f64 / self.total_files as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match (self.current_chunk, self.total_chunks) {
            (Some(current), Some(total)) => format!("{}/{} chunks", current, total),
            _ => format!("{}/{} files", self.current_file_index, self.total_files),
        };

        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        let file = self
            .current_file
            .as_deref()
            .map(|f| format!(" - {}", f))
            .unwrap_or_default();

        format!("[{}] {}{}{}", self.phase.as_str(), progress, pct, file)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter that emits events through a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new reporter with a callback.
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Create a no-op reporter (no events emitted).
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    /// Restart the elapsed clock.
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
    }

    /// Emit a progress event.
    pub fn emit(&self, event: ProgressEvent) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = event.phase.as_str(),
            file_index = event.current_file_index,
            total_files = event.total_files,
            current_chunk = ?event.current_chunk,
            total_chunks = ?event.total_chunks,
            elapsed_secs = elapsed,
            "Progress event"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn scanning(&self, total_files: usize) {
        self.emit(ProgressEvent::new(SyncPhase::Scanning, 0, total_files));
    }

    pub fn processing(&self, file_index: usize, total_files: usize, path: &str) {
        self.emit(ProgressEvent::new(SyncPhase::Processing, file_index, total_files).with_file(path));
    }

    pub fn indexing(&self, total_files: usize, current_chunk: usize, total_chunks: usize) {
        self.emit(
            ProgressEvent::new(SyncPhase::Indexing, total_files, total_files)
                .with_chunks(current_chunk, total_chunks),
        );
    }

    pub fn finalizing(&self, total_files: usize) {
        self.emit(ProgressEvent::new(SyncPhase::Finalizing, total_files, total_files));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

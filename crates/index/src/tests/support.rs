//! Shared fixtures for engine scenario tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use vaultsearch_core::{AppError, AppResult};

use crate::blob_index::JsonVectorIndex;
use crate::chunk_store::ChunkStore;
use crate::config::{IndexSettings, CHUNK_STORE_BLOB};
use crate::embeddings::providers::MockProvider;
use crate::embeddings::{Embedder, EmbeddingConfig, RetryPolicy};
use crate::notice::{Notice, NoticeSink};
use crate::pause::PauseHandle;
use crate::progress::{ProgressEvent, ProgressReporter, SyncPhase};
use crate::source::{DocumentSource, MemoryVault};
use crate::storage::{BlobStore, FsBlobStore};
use crate::sync::IndexSyncManager;
use crate::types::DocumentInfo;

pub const DIMENSIONS: usize = 32;

/// In-memory vault whose reads can be made to fail per path.
#[derive(Default)]
pub struct TestVault {
    inner: MemoryVault,
    failing: Mutex<HashSet<String>>,
}

impl TestVault {
    pub fn insert(&self, path: &str, text: &str) {
        self.inner.insert(path, text);
    }

    pub fn remove(&self, path: &str) {
        self.inner.remove(path);
    }

    pub fn fail_reads(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }
}

impl DocumentSource for TestVault {
    fn list_documents(&self) -> AppResult<Vec<DocumentInfo>> {
        self.inner.list_documents()
    }

    fn read_document(&self, path: &str) -> AppResult<String> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(AppError::Document {
                path: path.to_string(),
                message: "simulated read failure".to_string(),
            });
        }
        self.inner.read_document(path)
    }
}

pub type Manager = IndexSyncManager<JsonVectorIndex>;

pub struct Harness {
    pub temp: TempDir,
    pub vault: Arc<TestVault>,
    pub provider: Arc<MockProvider>,
    pub pause: PauseHandle,
    notices: Arc<Mutex<Vec<Notice>>>,
    events: Arc<Mutex<Vec<ProgressEvent>>>,
    pause_on_indexing: Arc<AtomicBool>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            vault: Arc::new(TestVault::default()),
            provider: Arc::new(MockProvider::new(DIMENSIONS)),
            pause: PauseHandle::new(),
            notices: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            pause_on_indexing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a manager with structured chunking and default rebuild batches.
    pub async fn open(&self) -> Manager {
        self.open_with(self.provider.clone(), 100).await
    }

    pub async fn open_with(&self, provider: Arc<MockProvider>, rebuild_batch_size: usize) -> Manager {
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(self.temp.path()).unwrap());

        let notices = self.notices.clone();
        let sink = NoticeSink::new(Arc::new(move |n: &Notice| {
            notices.lock().unwrap().push(n.clone());
        }));

        let events = self.events.clone();
        let pause = self.pause.clone();
        let pause_on_indexing = self.pause_on_indexing.clone();
        let reporter = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            if event.phase == SyncPhase::Indexing && pause_on_indexing.swap(false, Ordering::SeqCst)
            {
                pause.pause();
            }
            events.lock().unwrap().push(event);
        }));

        let config = EmbeddingConfig {
            provider: "mock".to_string(),
            batch_size: 10,
            ..EmbeddingConfig::default()
        };
        let embedder = Embedder::new(provider, &config).with_retry(RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
        });

        let settings = IndexSettings::default();
        let index = JsonVectorIndex::new(blobs.clone(), embedder)
            .with_weights(settings.weights())
            .with_notices(sink.clone());
        let store = ChunkStore::new(blobs, CHUNK_STORE_BLOB);
        let source: Arc<dyn DocumentSource> = self.vault.clone();

        let mut manager = IndexSyncManager::new(source, store, index, settings.chunk_config())
            .with_rebuild_batch_size(rebuild_batch_size)
            .with_pause(self.pause.clone())
            .with_progress(reporter)
            .with_notices(sink);

        manager.initialize().await.unwrap();
        manager
    }

    /// Pause the next rebuild as soon as its first indexing progress arrives.
    pub fn pause_on_first_indexing(&self) {
        self.pause_on_indexing.store(true, Ordering::SeqCst);
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Distinct phases in the order they were first reported.
    pub fn phases(&self) -> Vec<SyncPhase> {
        let mut phases: Vec<SyncPhase> = Vec::new();
        for event in self.events() {
            if phases.last() != Some(&event.phase) {
                phases.push(event.phase);
            }
        }
        phases
    }

    pub fn blob_exists(&self, name: &str) -> bool {
        self.temp.path().join(name).exists()
    }

    /// Insert `count` single-paragraph notes with distinct vocabulary.
    pub fn seed_notes(&self, count: usize) {
        for i in 0..count {
            self.vault.insert(
                &format!("note{:02}.md", i),
                &format!("Note {} covers subject{} with marker{} words", i, i, i),
            );
        }
    }
}

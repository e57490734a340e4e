//! Document sources: where the text to index comes from.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

use vaultsearch_core::{AppError, AppResult};
use walkdir::{DirEntry, WalkDir};

use crate::types::DocumentInfo;

/// Extensions indexed by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Read-only access to a corpus of documents.
pub trait DocumentSource: Send + Sync {
    /// Every indexable document, sorted by path.
    fn list_documents(&self) -> AppResult<Vec<DocumentInfo>>;

    /// Full text of the document at `path`.
    fn read_document(&self, path: &str) -> AppResult<String>;
}

/// A vault backed by a directory tree.
///
/// Hidden files and directories (including the index data directory) are
/// skipped. Paths are reported relative to the root with `/` separators.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn should_include(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || path.is_empty() {
            return Err(AppError::Document {
                path: path.to_string(),
                message: "path must be relative to the vault root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn vault_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

impl DocumentSource for FsVault {
    fn list_documents(&self) -> AppResult<Vec<DocumentInfo>> {
        if !self.root.is_dir() {
            return Err(AppError::Config(format!(
                "Vault root {:?} is not a directory",
                self.root
            )));
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable vault entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.should_include(entry.path()) {
                continue;
            }
            let Some(path) = vault_path(&self.root, entry.path()) else {
                tracing::warn!("Skipping non-UTF-8 path {:?}", entry.path());
                continue;
            };

            let mtime = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            documents.push(DocumentInfo { path, mtime });
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Listed {} documents under {:?}", documents.len(), self.root);
        Ok(documents)
    }

    fn read_document(&self, path: &str) -> AppResult<String> {
        let full = self.resolve(path)?;
        std::fs::read_to_string(&full).map_err(|e| AppError::Document {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// An in-memory vault for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryVault {
    documents: RwLock<BTreeMap<String, (String, i64)>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document, stamping it with the current time.
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        let mtime = chrono::Utc::now().timestamp_millis();
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(path.into(), (text.into(), mtime));
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        self.documents
            .write()
            .map(|mut docs| docs.remove(path).is_some())
            .unwrap_or(false)
    }
}

impl DocumentSource for MemoryVault {
    fn list_documents(&self) -> AppResult<Vec<DocumentInfo>> {
        let docs = self
            .documents
            .read()
            .map_err(|_| AppError::Other("memory vault lock poisoned".to_string()))?;
        Ok(docs
            .iter()
            .map(|(path, (_, mtime))| DocumentInfo {
                path: path.clone(),
                mtime: *mtime,
            })
            .collect())
    }

    fn read_document(&self, path: &str) -> AppResult<String> {
        let docs = self
            .documents
            .read()
            .map_err(|_| AppError::Other("memory vault lock poisoned".to_string()))?;
        docs.get(path)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| AppError::Document {
                path: path.to_string(),
                message: "no such document".to_string(),
            })
    }
}

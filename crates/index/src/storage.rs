//! Whole-file blob persistence.
//!
//! The index and the chunk store each serialize to a single blob addressed by
//! a relative path. Writes replace the blob wholesale; there are no appends.

use std::fs;
use std::path::{Path, PathBuf};

use vaultsearch_core::{AppError, AppResult};

/// Opaque blob storage provided by the host.
pub trait BlobStore: Send + Sync {
    /// Read a blob. Returns `None` when it does not exist.
    fn read(&self, path: &str) -> AppResult<Option<String>>;

    /// Replace a blob with new contents.
    fn write(&self, path: &str, contents: &str) -> AppResult<()>;

    fn exists(&self, path: &str) -> bool;

    /// Remove a blob. Removing a missing blob is not an error.
    fn remove(&self, path: &str) -> AppResult<()>;

    fn copy(&self, from: &str, to: &str) -> AppResult<()>;

    fn rename(&self, from: &str, to: &str) -> AppResult<()>;
}

/// Blob store backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AppError::Index(format!("Failed to create data directory {:?}: {}", root, e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for FsBlobStore {
    fn read(&self, path: &str) -> AppResult<Option<String>> {
        let full = self.resolve(path);
        match fs::read_to_string(&full) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &str, contents: &str) -> AppResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling and rename so readers never observe a torn blob
        let tmp = full.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &full)?;

        tracing::trace!("Wrote {} bytes to {:?}", contents.len(), full);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&self, path: &str) -> AppResult<()> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn copy(&self, from: &str, to: &str) -> AppResult<()> {
        fs::copy(self.resolve(from), self.resolve(to))?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        fs::rename(self.resolve(from), self.resolve(to))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();
        assert!(store.read("nope.json").unwrap().is_none());
        assert!(!store.exists("nope.json"));
        store.remove("nope.json").unwrap();
    }

    #[test]
    fn test_write_copy_rename() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path().join("state")).unwrap();

        store.write("index.json", "{}").unwrap();
        store.copy("index.json", "index.json.backup").unwrap();
        store.write("index.json", "{\"v\":2}").unwrap();

        assert_eq!(store.read("index.json.backup").unwrap().unwrap(), "{}");
        store.rename("index.json.backup", "old.bak").unwrap();
        assert!(store.exists("old.bak"));
        assert!(!store.exists("index.json.backup"));
        assert_eq!(store.read("index.json").unwrap().unwrap(), "{\"v\":2}");
    }
}

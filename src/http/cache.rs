//! Process-lifetime file cache.
//!
//! # Responsibilities
//! - Serve file bytes for resolved paths, reading each file at most once
//! - Share one immutable copy of the bytes across handlers
//!
//! # Design Decisions
//! - Entries are never invalidated; the device's static root does not
//!   change while the server runs
//! - Failed reads are not cached, so a file that appears later is picked
//!   up on the next request

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

/// Cache of file contents keyed by resolved path.
#[derive(Default)]
pub struct FileCache {
    entries: DashMap<PathBuf, Arc<[u8]>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file through the cache. The first successful read for a
    /// path populates the entry for the remainder of the run.
    pub async fn read(&self, path: &Path) -> std::io::Result<Arc<[u8]>> {
        if let Some(hit) = self.entries.get(path) {
            return Ok(Arc::clone(hit.value()));
        }
        let bytes: Arc<[u8]> = tokio::fs::read(path).await?.into();
        self.entries.insert(path.to_path_buf(), Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_first_read_populates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, b"hello").unwrap();

        let cache = FileCache::new();
        assert_eq!(&*cache.read(&path).await.unwrap(), b"hello");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_entries_never_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, b"old").unwrap();

        let cache = FileCache::new();
        assert_eq!(&*cache.read(&path).await.unwrap(), b"old");

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"new").unwrap();
        drop(file);

        // Still the first-read bytes
        assert_eq!(&*cache.read(&path).await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_failed_read_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.html");

        let cache = FileCache::new();
        assert!(cache.read(&path).await.is_err());
        assert!(cache.is_empty());

        std::fs::write(&path, b"now").unwrap();
        assert_eq!(&*cache.read(&path).await.unwrap(), b"now");
    }
}

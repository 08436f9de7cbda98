//! Byte-level persistence for alarm state and reports

use crate::errors::StateError;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Opaque blob storage keyed by a relative path.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored under `key` yet.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StateError>> + Send;

    fn save(&self, key: &str, bytes: &[u8]) -> impl Future<Output = Result<(), StateError>> + Send;
}

/// Stores blobs as files below an output directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl StateStore for FsStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StateError> {
        let path = self.path_for(key);
        let write_failed = |e: std::io::Error| StateError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        fs::write(&path, bytes).await.map_err(write_failed)?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_key_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.load("json/nothing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        store.save("json/api_health.json", b"{}").await.unwrap();
        let loaded = store.load("json/api_health.json").await.unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"{}"[..]));
    }
}

//! Client-local key/value slot holding the serialized cart.

use async_trait::async_trait;
use mockall::automock;
use std::{io::ErrorKind, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cart storage I/O error")]
    Io(#[from] std::io::Error),

    #[error("cart storage unavailable: {0}")]
    Unavailable(String),
}

#[automock]
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Returns the stored blob, or `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the stored blob.
    async fn save(&self, blob: String) -> Result<(), StorageError>;
}

/// In-process slot; clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCartStorage {
    pub fn new() -> Self { Self::default() }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(blob.into()))) }
    }

    pub async fn contents(&self) -> Option<String> { self.slot.lock().await.clone() }
}

#[async_trait]
impl CartStorage for MemoryCartStorage {
    async fn load(&self) -> Result<Option<String>, StorageError> { Ok(self.slot.lock().await.clone()) }

    async fn save(&self, blob: String) -> Result<(), StorageError> {
        *self.slot.lock().await = Some(blob);
        Ok(())
    }
}

/// JSON file slot. Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        staging.into()
    }
}

#[async_trait]
impl CartStorage for FileCartStorage {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, blob: String) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        tokio::fs::write(&staging, blob).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

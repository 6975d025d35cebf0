//! Byte-addressable storage of managed repositories, addressed by repository relative paths.

pub mod fs_storage;
pub mod transient_storage;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ManagedRepository;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid path {0:?}")]
    InvalidPath(String),
}
impl StorageError {
    pub fn io(path: &str, source: std::io::Error) -> StorageError {
        StorageError::Io { path: path.to_string(), source }
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub data: Bytes,
    pub last_modified: SystemTime,
}

/// Storage of a single managed repository.
///
/// Writes are atomic for concurrent readers: a reader sees either the previous content or
///  the new content, never a partially written file.
#[async_trait]
pub trait RepositoryStorage: Send + Sync {
    /// `None` if there is no file at `path`
    async fn read(&self, path: &str) -> Result<Option<StoredFile>, StorageError>;

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.last_modified(path).await?.is_some())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<SystemTime>, StorageError>;

    /// names of the entries of a directory, sorted; empty if the directory does not exist
    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError>;

    /// `false` if there was nothing to delete
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
}

/// Hands out the storage for a managed repository
pub trait StorageProvider: Send + Sync {
    fn storage_for(&self, repository: &ManagedRepository) -> Arc<dyn RepositoryStorage>;
}

/// Rejects paths that could escape the repository root. Leading '/' and empty segments are
///  tolerated, the result is the path in canonical form.
pub fn checked_path(path: &str) -> Result<String, StorageError> {
    let segments: Vec<&str> = path.split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if segments.iter().any(|s| *s == "." || *s == ".." || s.contains('\\') || s.contains('\0')) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::config::ManagedRepository;
use crate::storage::{checked_path, RepositoryStorage, StorageError, StorageProvider, StoredFile};

/// in-memory repository storage, neither optimized nor particularly robust - for testing purposes
#[derive(Default)]
pub struct TransientRepositoryStorage {
    files: DashMap<String, StoredFile>,
    read_only: AtomicBool,
}
impl TransientRepositoryStorage {
    pub fn new() -> TransientRepositoryStorage {
        Default::default()
    }

    /// stores a file with an explicit modification time, bypassing the read-only flag
    pub fn insert_with_last_modified(&self, path: &str, data: impl Into<Bytes>, last_modified: SystemTime) {
        if let Ok(path) = checked_path(path) {
            self.files.insert(path, StoredFile { data: data.into(), last_modified });
        }
    }

    /// subsequent writes fail with an I/O error
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn paths(&self) -> Vec<String> {
        let mut result: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        result.sort();
        result
    }
}

#[async_trait]
impl RepositoryStorage for TransientRepositoryStorage {
    async fn read(&self, path: &str) -> Result<Option<StoredFile>, StorageError> {
        let path = checked_path(path)?;
        Ok(self.files.get(&path).map(|f| f.value().clone()))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let path = checked_path(path)?;
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path));
        }
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::io(&path, std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only storage")));
        }
        self.files.insert(path, StoredFile { data, last_modified: SystemTime::now() });
        Ok(())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<SystemTime>, StorageError> {
        let path = checked_path(path)?;
        Ok(self.files.get(&path).map(|f| f.last_modified))
    }

    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let dir_path = checked_path(dir_path)?;
        let prefix = if dir_path.is_empty() { String::new() } else { format!("{}/", dir_path) };

        let mut result: Vec<String> = self.files.iter()
            .filter_map(|e| e.key().strip_prefix(&prefix).map(|rest| rest.split('/').next().unwrap_or(rest).to_string()))
            .collect();
        result.sort();
        result.dedup();
        Ok(result)
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let path = checked_path(path)?;
        Ok(self.files.remove(&path).is_some())
    }
}

/// In-memory storage per managed repository id
#[derive(Default)]
pub struct TransientStorageProvider {
    storages: DashMap<String, Arc<TransientRepositoryStorage>>,
}
impl TransientStorageProvider {
    pub fn new() -> TransientStorageProvider {
        Default::default()
    }

    pub fn storage(&self, repository_id: &str) -> Arc<TransientRepositoryStorage> {
        self.storages.entry(repository_id.to_string())
            .or_default()
            .clone()
    }
}
impl StorageProvider for TransientStorageProvider {
    fn storage_for(&self, repository: &ManagedRepository) -> Arc<dyn RepositoryStorage> {
        self.storage(&repository.id)
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::fs::{create_dir_all, metadata, read, read_dir, remove_file, rename, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, trace};
use uuid::Uuid;

use crate::config::ManagedRepository;
use crate::storage::{checked_path, RepositoryStorage, StorageError, StorageProvider, StoredFile};

const TEMP_SUFFIX: &str = ".inserting";

/// A managed repository in a directory of the local file system.
///
/// Files are written to a uniquely named temporary file next to their final location and
///  then renamed into place. The rename is guarded by a per-path lock so that concurrent
///  writers of the same path replace each other one at a time; readers never take the lock.
pub struct FsRepositoryStorage {
    root: PathBuf,
    rename_locks: DashMap<String, Arc<Mutex<()>>>,
}
impl FsRepositoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> FsRepositoryStorage {
        FsRepositoryStorage {
            root: root.into(),
            rename_locks: DashMap::new(),
        }
    }

    fn file_path(&self, path: &str) -> Result<(String, PathBuf), StorageError> {
        let path = checked_path(path)?;
        let mut result = self.root.clone();
        result.extend(path.split('/').filter(|s| !s.is_empty()));
        Ok((path, result))
    }

    async fn do_write(temp_path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(temp_path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn rename_into_place(&self, path: &str, temp_path: &Path, file_path: &Path) -> std::io::Result<()> {
        let lock = self.rename_locks.entry(path.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            rename(temp_path, file_path).await
        };

        // the map's reference and ours: nobody else is waiting
        self.rename_locks.remove_if(path, |_, l| Arc::strong_count(l) <= 2);
        result
    }
}

#[async_trait]
impl RepositoryStorage for FsRepositoryStorage {
    async fn read(&self, path: &str) -> Result<Option<StoredFile>, StorageError> {
        let (path, file_path) = self.file_path(path)?;
        trace!("reading {} from {}", path, file_path.display());

        let last_modified = match metadata(&file_path).await {
            Ok(m) if m.is_file() => m.modified().map_err(|e| StorageError::io(&path, e))?,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        match read(&file_path).await {
            Ok(data) => Ok(Some(StoredFile {
                data: Bytes::from(data),
                last_modified,
            })),
            // deleted in the meantime
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let (path, file_path) = self.file_path(path)?;
        let (dir, file_name) = match (file_path.parent(), file_path.file_name()) {
            (Some(dir), Some(file_name)) if !path.is_empty() => (dir.to_path_buf(), file_name.to_string_lossy().to_string()),
            _ => return Err(StorageError::InvalidPath(path)),
        };

        create_dir_all(&dir).await
            .map_err(|e| StorageError::io(&path, e))?;

        let temp_path = dir.join(format!(".{}.{}{}", file_name, Uuid::new_v4().as_hyphenated(), TEMP_SUFFIX));
        trace!("writing {} via {}", path, temp_path.display());

        let result = match Self::do_write(&temp_path, &data).await {
            Ok(()) => self.rename_into_place(&path, &temp_path, &file_path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup_error) = remove_file(&temp_path).await {
                if cleanup_error.kind() != ErrorKind::NotFound {
                    error!("error cleaning up {} after failed attempt to write: {}", temp_path.display(), cleanup_error);
                }
            }
            return Err(StorageError::io(&path, e));
        }
        Ok(())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<SystemTime>, StorageError> {
        let (path, file_path) = self.file_path(path)?;
        match metadata(&file_path).await {
            Ok(m) if m.is_file() => Ok(Some(m.modified().map_err(|e| StorageError::io(&path, e))?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let (dir_path, file_path) = self.file_path(dir_path)?;

        let mut entries = match read_dir(&file_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StorageError::io(&dir_path, e)),
        };

        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(&dir_path, e))? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(TEMP_SUFFIX) {
                result.push(name);
            }
        }
        result.sort();
        Ok(result)
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let (path, file_path) = self.file_path(path)?;
        trace!("deleting {} at {}", path, file_path.display());
        match remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}

/// Storage of managed repositories in their configured locations. Instances are shared per
///  repository so that all writers of a repository use the same rename locks.
#[derive(Default)]
pub struct FsStorageProvider {
    storages: DashMap<(String, PathBuf), Arc<FsRepositoryStorage>>,
}
impl FsStorageProvider {
    pub fn new() -> FsStorageProvider {
        Default::default()
    }
}
impl StorageProvider for FsStorageProvider {
    fn storage_for(&self, repository: &ManagedRepository) -> Arc<dyn RepositoryStorage> {
        self.storages.entry((repository.id.clone(), repository.location.clone()))
            .or_insert_with(|| Arc::new(FsRepositoryStorage::new(repository.location.clone())))
            .clone()
    }
}

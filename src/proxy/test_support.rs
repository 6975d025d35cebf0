use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::config::{Configuration, RemoteRepository};
use crate::maven::remote_repo::{RemoteClient, TransportError};
use crate::proxy::RepositoryEngine;
use crate::storage::transient_storage::TransientStorageProvider;
use crate::util::checksum::ChecksumAlgorithm;

/// Remote repositories served from memory, keyed by (remote id, path). Unknown paths are 404.
#[derive(Default)]
pub struct FakeRemoteClient {
    files: DashMap<(String, String), Result<Bytes, TransportError>>,
    calls: Mutex<Vec<(String, String)>>,
    delay: Mutex<Duration>,
}
impl FakeRemoteClient {
    pub fn put(&self, remote: &str, path: &str, data: impl Into<Bytes>) {
        self.files.insert((remote.to_string(), path.to_string()), Ok(data.into()));
    }

    /// the file plus matching .sha1 and .md5 files
    pub fn put_with_checksums(&self, remote: &str, path: &str, data: impl Into<Bytes>) {
        let data = data.into();
        for algorithm in ChecksumAlgorithm::ALL {
            self.put(remote, &algorithm.companion_path(path), algorithm.digest_hex(&data));
        }
        self.put(remote, path, data);
    }

    pub fn fail(&self, remote: &str, path: &str, error: TransportError) {
        self.files.insert((remote.to_string(), path.to_string()), Err(error));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self, remote: &str, path: &str) -> usize {
        self.calls.lock().unwrap().iter()
            .filter(|(r, p)| r == remote && p == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// remotes that were asked for `path`, in the order of the requests
    pub fn remotes_asked_for(&self, path: &str) -> Vec<String> {
        self.calls.lock().unwrap().iter()
            .filter(|(_, p)| p == path)
            .map(|(r, _)| r.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteClient for FakeRemoteClient {
    async fn fetch(&self, remote: &RemoteRepository, path: &str, timeout: Duration) -> Result<Bytes, TransportError> {
        let key = (remote.id.clone(), path.to_string());
        self.calls.lock().unwrap().push(key.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() && tokio::time::timeout(timeout, tokio::time::sleep(delay)).await.is_err() {
            return Err(TransportError::Timeout(timeout));
        }

        self.files.get(&key)
            .map(|f| f.value().clone())
            .unwrap_or(Err(TransportError::NotFound))
    }
}

pub struct Fixture {
    pub engine: RepositoryEngine,
    pub storage: Arc<TransientStorageProvider>,
    pub remote: Arc<FakeRemoteClient>,
}
impl Fixture {
    pub fn new(configuration: Configuration) -> Fixture {
        let storage = Arc::new(TransientStorageProvider::new());
        let remote = Arc::new(FakeRemoteClient::default());
        Fixture {
            engine: RepositoryEngine::new(configuration, storage.clone(), remote.clone()),
            storage,
            remote,
        }
    }
}

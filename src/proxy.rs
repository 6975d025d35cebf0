//! The resolution engine: serves paths of managed repositories and groups, filling gaps from
//!  remote repositories through the proxy connectors.

pub mod failure_cache;
pub mod fetch_coordinator;
pub mod group;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{ConfigSnapshot, Configuration, FailureCacheConfig};
use crate::error::ResolveError;
use crate::maven::paths::PathKind;
use crate::maven::remote_repo::RemoteClient;
use crate::proxy::failure_cache::FailureCache;
use crate::proxy::fetch_coordinator::FetchCoordinator;
use crate::proxy::group::{CacheGeneration, MergedMetadata, MergedMetadataCache};
use crate::storage::{checked_path, StorageProvider, StoredFile};
use crate::util::checksum::ChecksumAlgorithm;

/// Content served for a request
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub data: Bytes,
    pub last_modified: SystemTime,
}
impl From<StoredFile> for ResolvedFile {
    fn from(value: StoredFile) -> Self {
        ResolvedFile {
            data: value.data,
            last_modified: value.last_modified,
        }
    }
}

pub(crate) struct EngineInner {
    config: ArcSwap<ConfigSnapshot>,
    storage: Arc<dyn StorageProvider>,
    remote_client: Arc<dyn RemoteClient>,
    failure_cache: ArcSwap<FailureCache>,
    merged_metadata: MergedMetadataCache,
    resolutions: FetchCoordinator<(String, String), ResolvedFile>,
    metadata_merges: FetchCoordinator<(String, String, CacheGeneration), Arc<MergedMetadata>>,
}
impl EngineInner {
    /// Resolution of a managed repository path. Concurrent resolutions of the same path share
    ///  a single run through the connectors.
    async fn resolve_managed(self: &Arc<Self>, snapshot: Arc<ConfigSnapshot>, repository_id: &str, path: &str) -> Result<ResolvedFile, ResolveError> {
        let repository = snapshot.managed_repository(repository_id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownRepository(repository_id.to_string()))?;

        let key = (repository.id.clone(), path.to_string());
        let inner = self.clone();
        let path = path.to_string();
        self.resolutions.run(key, async move {
            resolver::resolve(&inner, &snapshot, &repository, &path).await
        }).await
    }
}

/// Entry point for the serving layer. Cheap to clone, all clones share state.
#[derive(Clone)]
pub struct RepositoryEngine {
    inner: Arc<EngineInner>,
}
impl RepositoryEngine {
    pub fn new(configuration: Configuration, storage: Arc<dyn StorageProvider>, remote_client: Arc<dyn RemoteClient>) -> RepositoryEngine {
        let failure_cache = new_failure_cache(&configuration.failure_cache);
        RepositoryEngine {
            inner: Arc::new(EngineInner {
                config: ArcSwap::from_pointee(ConfigSnapshot::build(configuration)),
                storage,
                remote_client,
                failure_cache: ArcSwap::from_pointee(failure_cache),
                merged_metadata: MergedMetadataCache::default(),
                resolutions: FetchCoordinator::new(),
                metadata_merges: FetchCoordinator::new(),
            })
        }
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.inner.config.load_full()
    }

    /// Replaces the configuration. Requests that are already running finish with the
    ///  configuration they started with.
    pub fn reconfigure(&self, configuration: Configuration) {
        let current = self.inner.failure_cache.load();
        let failure_config = &configuration.failure_cache;
        if current.ttl() != Duration::from_secs(failure_config.ttl_secs) || current.max_entries() != failure_config.max_entries {
            debug!("failure cache settings changed, starting with an empty failure cache");
            self.inner.failure_cache.store(Arc::new(new_failure_cache(failure_config)));
        }

        self.inner.config.store(Arc::new(ConfigSnapshot::build(configuration)));
        self.inner.merged_metadata.clear();
        info!("configuration updated");
    }

    pub async fn resolve(&self, repository_id: &str, path: &str) -> Result<ResolvedFile, ResolveError> {
        let path = normalize_request_path(path)
            .ok_or_else(|| ResolveError::not_found(path))?;
        self.inner.resolve_managed(self.snapshot(), repository_id, &path).await
    }

    pub async fn resolve_group(&self, group_id: &str, path: &str) -> Result<ResolvedFile, ResolveError> {
        let path = normalize_request_path(path)
            .ok_or_else(|| ResolveError::not_found(path))?;

        let snapshot = self.snapshot();
        let group = snapshot.group(group_id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownRepository(group_id.to_string()))?;

        group::resolve(&self.inner, snapshot, &group, &path).await
    }

    /// Stores a file in a managed repository, generating checksum files for artifacts and
    ///  metadata documents.
    pub async fn deploy(&self, repository_id: &str, path: &str, data: Bytes) -> Result<(), ResolveError> {
        let snapshot = self.snapshot();
        let repository = snapshot.managed_repository(repository_id)
            .ok_or_else(|| ResolveError::UnknownRepository(repository_id.to_string()))?;
        let path = normalize_request_path(path)
            .ok_or_else(|| ResolveError::ArtifactNotAccepted {
                repository: repository.id.clone(),
                path: path.to_string(),
                reason: "invalid path".to_string(),
            })?;

        let storage = self.inner.storage.storage_for(repository);
        let kind = snapshot.translator().classify(&path, repository.layout);

        if let Some(artifact) = kind.artifact() {
            if !repository.accepts(artifact) {
                return Err(ResolveError::ArtifactNotAccepted {
                    repository: repository.id.clone(),
                    path,
                    reason: if artifact.is_snapshot() { "snapshots are not accepted" } else { "releases are not accepted" }.to_string(),
                });
            }
        }
        if let PathKind::Artifact(artifact) = &kind {
            if repository.block_redeployments && !artifact.is_snapshot() {
                let exists = storage.exists(&path).await
                    .map_err(|e| ResolveError::Internal(e.to_string()))?;
                if exists {
                    warn!(repository = %repository.id, path = %path, "blocked redeployment");
                    return Err(ResolveError::RedeploymentBlocked(path));
                }
            }
        }

        let storage_write_error = |path: &str, e: crate::storage::StorageError| ResolveError::StorageWrite {
            path: path.to_string(),
            reason: e.to_string(),
        };

        storage.write(&path, data.clone()).await
            .map_err(|e| storage_write_error(&path, e))?;
        if matches!(kind, PathKind::Artifact(_) | PathKind::Metadata) {
            for algorithm in ChecksumAlgorithm::ALL {
                let checksum_path = algorithm.companion_path(&path);
                storage.write(&checksum_path, Bytes::from(algorithm.digest_hex(&data))).await
                    .map_err(|e| storage_write_error(&checksum_path, e))?;
            }
        }

        for group in snapshot.groups_containing(&repository.id) {
            self.inner.merged_metadata.invalidate_group(&group.id);
        }
        info!(repository = %repository.id, path = %path, size = data.len(), "deployed");
        Ok(())
    }

    /// Fetches a remote's check path (or its base URL) to see whether it is reachable
    pub async fn check_remote(&self, remote_id: &str) -> Result<(), ResolveError> {
        let snapshot = self.snapshot();
        let remote = snapshot.remote_repository(remote_id)
            .ok_or_else(|| ResolveError::UnknownRepository(remote_id.to_string()))?;

        let check_path = remote.check_path.as_deref().unwrap_or("");
        match self.inner.remote_client.fetch(remote, check_path, remote.timeout()).await {
            Ok(_) => {
                debug!(remote = %remote.id, check_path, "remote is reachable");
                Ok(())
            }
            Err(e) => {
                warn!(remote = %remote.id, check_path, "remote is not reachable: {}", e);
                Err(ResolveError::UpstreamTransport {
                    remote: remote.id.clone(),
                    source: e,
                })
            }
        }
    }

    /// Housekeeping, expected to be called periodically
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.inner.failure_cache.load().evict_expired_and_over_capacity(now);
        self.inner.merged_metadata.evict_expired(now);
    }
}

fn new_failure_cache(config: &FailureCacheConfig) -> FailureCache {
    FailureCache::new(Duration::from_secs(config.ttl_secs), config.max_entries)
}

/// Canonical form of a requested path: separators unified, no leading '/' or empty segments.
///  Paths with `.` or `..` segments are rejected.
pub fn normalize_request_path(path: &str) -> Option<String> {
    checked_path(&path.replace('\\', "/"))
        .ok()
        .filter(|p| !p.is_empty())
}

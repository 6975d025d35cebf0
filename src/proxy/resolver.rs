//! Resolution of a path in a single managed repository: the local copy, refreshed or
//!  completed from the repository's proxy connectors in order.

use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, error, trace, warn};

use crate::config::{ConfigSnapshot, ConnectorRule, ManagedRepository, RemoteRepository};
use crate::error::ResolveError;
use crate::maven::paths::PathKind;
use crate::maven::remote_repo::TransportError;
use crate::policy::error_handling::ErrorHandling;
use crate::proxy::failure_cache::FailureKey;
use crate::proxy::{EngineInner, ResolvedFile};
use crate::storage::RepositoryStorage;
use crate::util::checksum::ChecksumAlgorithm;

struct Fetched {
    data: Bytes,
    checksums: Vec<(ChecksumAlgorithm, Bytes)>,
}

enum FetchFailure {
    /// the remote does not have the file
    Absent,
    Failed(ResolveError),
}

pub(crate) async fn resolve(inner: &EngineInner, snapshot: &ConfigSnapshot, repository: &ManagedRepository, path: &str) -> Result<ResolvedFile, ResolveError> {
    let kind = snapshot.translator().classify(path, repository.layout);
    if let Some(artifact) = kind.artifact() {
        if !repository.accepts(artifact) {
            debug!(repository = %repository.id, path, "repository does not hold this kind of artifact");
            return Err(ResolveError::not_found(path));
        }
    }

    let storage = inner.storage.storage_for(repository);
    let local = match storage.read(path).await {
        Ok(local) => local,
        Err(e) => {
            warn!(repository = %repository.id, path, "reading local copy failed, treating it as absent: {}", e);
            None
        }
    };
    let local_last_modified = local.as_ref().map(|f| f.last_modified);

    let now = SystemTime::now();
    let failure_cache = inner.failure_cache.load_full();
    let mut queued: Option<ResolveError> = None;

    for connector in snapshot.connectors_for(&repository.id) {
        if connector.disabled {
            trace!(repository = %repository.id, remote = %connector.target, "skipping disabled connector");
            continue;
        }
        if !connector.filter.allows(path) {
            debug!(repository = %repository.id, remote = %connector.target, path, "path is excluded by connector filter");
            continue;
        }

        let remote = snapshot.remote_repository(&connector.target).ok_or_else(|| {
            error!(repository = %repository.id, "proxy connector references unknown remote repository {}", connector.target);
            ResolveError::Configuration(format!("proxy connector {}->{} references an unknown remote repository", connector.source, connector.target))
        })?;

        let Some(remote_path) = snapshot.translator().translate(path, repository.layout, remote.layout) else {
            debug!(repository = %repository.id, remote = %remote.id, path, "path has no counterpart in the remote's layout");
            continue;
        };

        let failure_key = FailureKey::new(&remote.id, &remote_path);
        if failure_cache.is_live(&failure_key, Instant::now()) {
            debug!(remote = %remote.id, path = %remote_path, "skipping fetch that failed recently");
            continue;
        }

        if !connector.policies.should_fetch(&kind, local_last_modified, now) {
            trace!(repository = %repository.id, remote = %remote.id, path, "local copy is recent enough");
            continue;
        }

        let error = match fetch(inner, connector, remote, &remote_path, &kind).await {
            Ok(fetched) => {
                publish(storage.as_ref(), &repository.id, path, &fetched).await;
                return Ok(ResolvedFile {
                    data: fetched.data,
                    last_modified: SystemTime::now(),
                });
            }
            Err(failure) => {
                if connector.policies.caches_failures() {
                    failure_cache.record(failure_key, Instant::now());
                }
                match failure {
                    FetchFailure::Absent => {
                        debug!(remote = %remote.id, path = %remote_path, "not found on remote");
                        continue;
                    }
                    FetchFailure::Failed(e) => e,
                }
            }
        };

        warn!(repository = %repository.id, remote = %remote.id, path = %remote_path, "{}", error);
        match connector.policies.on_error(local.is_some()) {
            ErrorHandling::Stop => return Err(error),
            ErrorHandling::Queue => {
                queued.get_or_insert(error);
            }
            ErrorHandling::Ignore => {}
        }
    }

    if let Some(local) = local {
        return Ok(local.into());
    }
    Err(queued.unwrap_or_else(|| ResolveError::not_found(path)))
}

/// Fetches a file and, for artifacts and metadata, the checksum files next to it, and applies
///  the connector's checksum policy
async fn fetch(inner: &EngineInner, connector: &ConnectorRule, remote: &RemoteRepository, remote_path: &str, kind: &PathKind) -> Result<Fetched, FetchFailure> {
    let timeout = remote.timeout();
    debug!(remote = %remote.id, path = remote_path, "fetching");

    let main = inner.remote_client.fetch(remote, remote_path, timeout);
    let (data, companions) = if matches!(kind, PathKind::Artifact(_) | PathKind::Metadata) {
        let companions = join_all(ChecksumAlgorithm::ALL.into_iter()
            .map(|algorithm| fetch_companion(inner, remote, remote_path, algorithm, timeout)));
        tokio::join!(main, companions)
    }
    else {
        (main.await, Vec::new())
    };

    let data = data.map_err(|e| match e {
        TransportError::NotFound => FetchFailure::Absent,
        e => FetchFailure::Failed(ResolveError::UpstreamTransport {
            remote: remote.id.clone(),
            source: e,
        }),
    })?;

    if matches!(kind, PathKind::Artifact(_) | PathKind::Metadata) {
        let checksums = connector.policies.checksum.apply(&data, companions)
            .map_err(|failure| FetchFailure::Failed(ResolveError::ChecksumValidationFailed {
                remote: remote.id.clone(),
                path: remote_path.to_string(),
                reason: failure.to_string(),
            }))?;
        return Ok(Fetched { data, checksums });
    }
    Ok(Fetched { data, checksums: Vec::new() })
}

/// a checksum file that can not be fetched counts as absent
async fn fetch_companion(inner: &EngineInner, remote: &RemoteRepository, remote_path: &str, algorithm: ChecksumAlgorithm, timeout: Duration) -> (ChecksumAlgorithm, Option<Bytes>) {
    let path = algorithm.companion_path(remote_path);
    match inner.remote_client.fetch(remote, &path, timeout).await {
        Ok(data) => (algorithm, Some(data)),
        Err(TransportError::NotFound) => (algorithm, None),
        Err(e) => {
            debug!(remote = %remote.id, path = %path, "fetching checksum failed: {}", e);
            (algorithm, None)
        }
    }
}

/// Stores fetched content in the managed repository. Failures are logged, the fetched
///  content is served regardless.
async fn publish(storage: &dyn RepositoryStorage, repository_id: &str, path: &str, fetched: &Fetched) {
    if let Err(e) = storage.write(path, fetched.data.clone()).await {
        error!(repository = repository_id, path, "storing fetched file failed: {}", e);
        return;
    }
    for (algorithm, checksum) in &fetched.checksums {
        let checksum_path = algorithm.companion_path(path);
        if let Err(e) = storage.write(&checksum_path, checksum.clone()).await {
            error!(repository = repository_id, path = %checksum_path, "storing checksum failed: {}", e);
        }
    }
    trace!(repository = repository_id, path, "stored fetched file");
}

//! Repository groups: a single virtual repository over an ordered list of managed repositories.
//!
//! Metadata documents are merged across all members and cached per group; everything else is
//!  served by the first member that has it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, trace, warn};

use crate::config::{ConfigSnapshot, RepositoryGroup};
use crate::error::ResolveError;
use crate::maven::metadata_merge::merge_metadata;
use crate::maven::metadata_xml::Metadata;
use crate::maven::paths::{PathKind, RepositoryLayout};
use crate::proxy::{EngineInner, ResolvedFile};
use crate::util::checksum::ChecksumAlgorithm;

/// A merged metadata document with its checksums
#[derive(Debug)]
pub struct MergedMetadata {
    pub xml: Bytes,
    checksums: Vec<(ChecksumAlgorithm, Bytes)>,
    pub generated: SystemTime,
    generated_at: Instant,
}
impl MergedMetadata {
    pub fn new(xml: String) -> MergedMetadata {
        let checksums = ChecksumAlgorithm::ALL.into_iter()
            .map(|algorithm| (algorithm, Bytes::from(algorithm.digest_hex(xml.as_bytes()))))
            .collect();
        MergedMetadata {
            xml: Bytes::from(xml),
            checksums,
            generated: SystemTime::now(),
            generated_at: Instant::now(),
        }
    }

    pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Option<&Bytes> {
        self.checksums.iter()
            .find(|(a, _)| *a == algorithm)
            .map(|(_, c)| c)
    }

    fn is_live(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.generated_at) < ttl
    }

    fn as_file(&self) -> ResolvedFile {
        ResolvedFile {
            data: self.xml.clone(),
            last_modified: self.generated,
        }
    }
}

/// Changes whenever a group's cached metadata is invalidated. A merge result is only cached
///  if the generation it was started with is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    cleared: u64,
    group: u64,
}

#[derive(Default)]
struct Generations {
    cleared: u64,
    groups: HashMap<String, u64>,
}
impl Generations {
    fn of(&self, group_id: &str) -> CacheGeneration {
        CacheGeneration {
            cleared: self.cleared,
            group: self.groups.get(group_id).copied().unwrap_or(0),
        }
    }
}

struct CachedMerge {
    merged: Arc<MergedMetadata>,
    ttl: Duration,
}

/// Merged metadata per (group id, metadata path). Expired entries are ignored on lookup and
///  dropped by `evict_expired`.
#[derive(Default)]
pub struct MergedMetadataCache {
    entries: DashMap<(String, String), CachedMerge>,
    generations: Mutex<Generations>,
}
impl MergedMetadataCache {
    pub fn get(&self, group_id: &str, path: &str, ttl: Duration, now: Instant) -> Option<Arc<MergedMetadata>> {
        self.entries.get(&(group_id.to_string(), path.to_string()))
            .filter(|c| c.merged.is_live(ttl, now))
            .map(|c| c.merged.clone())
    }

    pub fn generation(&self, group_id: &str) -> CacheGeneration {
        self.generations().of(group_id)
    }

    /// Returns false, storing nothing, if the group was invalidated after `generation` was taken
    pub fn insert(&self, group_id: &str, path: &str, merged: Arc<MergedMetadata>, ttl: Duration, generation: CacheGeneration) -> bool {
        let generations = self.generations();
        if generations.of(group_id) != generation {
            return false;
        }
        self.entries.insert((group_id.to_string(), path.to_string()), CachedMerge { merged, ttl });
        true
    }

    pub fn invalidate_group(&self, group_id: &str) {
        let mut generations = self.generations();
        *generations.groups.entry(group_id.to_string()).or_default() += 1;
        self.entries.retain(|(g, _), _| g != group_id);
    }

    pub fn clear(&self) {
        let mut generations = self.generations();
        generations.cleared += 1;
        self.entries.clear();
    }

    pub fn evict_expired(&self, now: Instant) {
        self.entries.retain(|_, c| c.merged.is_live(c.ttl, now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) async fn resolve(inner: &Arc<EngineInner>, snapshot: Arc<ConfigSnapshot>, group: &RepositoryGroup, path: &str) -> Result<ResolvedFile, ResolveError> {
    match snapshot.translator().classify(path, RepositoryLayout::Default) {
        PathKind::Metadata => {
            merged_metadata(inner, snapshot, group, path).await
                .map(|merged| merged.as_file())
        }
        PathKind::MetadataChecksum(algorithm) => {
            let metadata_path = algorithm.strip_suffix(path)
                .ok_or_else(|| ResolveError::not_found(path))?;
            let merged = merged_metadata(inner, snapshot, group, metadata_path).await?;
            merged.checksum(algorithm)
                .map(|checksum| ResolvedFile {
                    data: checksum.clone(),
                    last_modified: merged.generated,
                })
                .ok_or_else(|| ResolveError::not_found(path))
        }
        _ => first_found(inner, snapshot, group, path).await,
    }
}

async fn first_found(inner: &Arc<EngineInner>, snapshot: Arc<ConfigSnapshot>, group: &RepositoryGroup, path: &str) -> Result<ResolvedFile, ResolveError> {
    let mut remembered = None;
    for member in &group.repositories {
        match resolve_member(inner, snapshot.clone(), group, member, path).await {
            Ok(file) => {
                trace!(group = %group.id, member = %member, path, "found");
                return Ok(file);
            }
            Err(ResolveError::NotFound(_)) => {}
            Err(e @ ResolveError::Configuration(_)) => return Err(e),
            Err(e) => {
                debug!(group = %group.id, member = %member, path, "resolution in member failed: {}", e);
                remembered.get_or_insert(e);
            }
        }
    }
    Err(remembered.unwrap_or_else(|| ResolveError::not_found(path)))
}

async fn resolve_member(inner: &Arc<EngineInner>, snapshot: Arc<ConfigSnapshot>, group: &RepositoryGroup, member: &str, path: &str) -> Result<ResolvedFile, ResolveError> {
    match inner.resolve_managed(snapshot, member, path).await {
        Err(ResolveError::UnknownRepository(_)) => Err(ResolveError::Configuration(
            format!("repository group {} references unknown managed repository {}", group.id, member)
        )),
        result => result,
    }
}

async fn merged_metadata(inner: &Arc<EngineInner>, snapshot: Arc<ConfigSnapshot>, group: &RepositoryGroup, path: &str) -> Result<Arc<MergedMetadata>, ResolveError> {
    if let Some(merged) = inner.merged_metadata.get(&group.id, path, group.merged_index_ttl(), Instant::now()) {
        trace!(group = %group.id, path, "merged metadata from cache");
        return Ok(merged);
    }

    // requests after an invalidation do not join a merge started before it
    let generation = inner.merged_metadata.generation(&group.id);
    let key = (group.id.clone(), path.to_string(), generation);
    let merge_inner = inner.clone();
    let group = group.clone();
    let path = path.to_string();
    inner.metadata_merges.run(key, async move {
        merge_members(&merge_inner, snapshot, &group, &path, generation).await
    }).await
}

async fn merge_members(inner: &Arc<EngineInner>, snapshot: Arc<ConfigSnapshot>, group: &RepositoryGroup, path: &str, generation: CacheGeneration) -> Result<Arc<MergedMetadata>, ResolveError> {
    let results = join_all(group.repositories.iter()
        .map(|member| resolve_member(inner, snapshot.clone(), group, member, path))
    ).await;

    let mut documents = Vec::new();
    let mut remembered = None;
    for (member, result) in group.repositories.iter().zip(results) {
        match result {
            Ok(file) => match Metadata::parse(&file.data) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(group = %group.id, member = %member, path, "ignoring unparsable metadata: {:#}", e),
            },
            Err(ResolveError::NotFound(_)) => {}
            Err(e @ ResolveError::Configuration(_)) => return Err(e),
            Err(e) => {
                debug!(group = %group.id, member = %member, path, "metadata of member not available: {}", e);
                remembered.get_or_insert(e);
            }
        }
    }

    if documents.is_empty() {
        return Err(remembered.unwrap_or_else(|| ResolveError::not_found(path)));
    }

    let xml = merge_metadata(&documents).to_xml()
        .map_err(|e| ResolveError::Internal(format!("{:#}", e)))?;
    let merged = Arc::new(MergedMetadata::new(xml));
    debug!(group = %group.id, path, documents = documents.len(), "merged metadata");

    if inner.merged_metadata.generation(&group.id) != generation {
        debug!(group = %group.id, path, "group changed during merge, result is not kept");
        return Ok(merged);
    }
    persist(inner, &snapshot, group, path, &merged).await;
    if !inner.merged_metadata.insert(&group.id, path, merged.clone(), group.merged_index_ttl(), generation) {
        debug!(group = %group.id, path, "group changed during merge, result is not cached");
    }
    Ok(merged)
}

/// Keeps a copy of the merged document in the first member's storage, below the group's
///  merged index path. Failures are only logged.
async fn persist(inner: &EngineInner, snapshot: &ConfigSnapshot, group: &RepositoryGroup, path: &str, merged: &MergedMetadata) {
    let Some(repository) = group.repositories.first().and_then(|id| snapshot.managed_repository(id)) else {
        return;
    };
    let storage = inner.storage.storage_for(repository);

    let target = merged_index_file_path(group, path);
    if let Err(e) = storage.write(&target, merged.xml.clone()).await {
        warn!(group = %group.id, path = %target, "storing merged metadata failed: {}", e);
        return;
    }
    for (algorithm, checksum) in &merged.checksums {
        let checksum_path = algorithm.companion_path(&target);
        if let Err(e) = storage.write(&checksum_path, checksum.clone()).await {
            warn!(group = %group.id, path = %checksum_path, "storing merged metadata checksum failed: {}", e);
        }
    }
}

/// `{merged index path}/{directory of path}/maven-metadata-{group id}.xml`
fn merged_index_file_path(group: &RepositoryGroup, path: &str) -> String {
    let dir = path.rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    let file_name = format!("maven-metadata-{}.xml", group.id);

    [group.merged_index_path.trim_matches('/'), dir, &file_name].into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod test {
    use crate::config::{Configuration, ManagedRepository, ProxyConnector, RemoteRepository};
    use crate::maven::remote_repo::TransportError;
    use crate::proxy::test_support::*;
    use crate::storage::RepositoryStorage;
    use super::*;

    const JAR: &str = "org/example/lib/1.0/lib-1.0.jar";
    const METADATA: &str = "org/example/lib/maven-metadata.xml";

    fn metadata_xml(versions: &[&str], latest: &str) -> String {
        let versions: String = versions.iter()
            .map(|v| format!("<version>{}</version>", v))
            .collect();
        format!(
            "<metadata><groupId>org.example</groupId><artifactId>lib</artifactId><versioning><latest>{}</latest><release>{}</release><versions>{}</versions></versioning></metadata>",
            latest, latest, versions,
        )
    }

    fn configuration(members: &[&str]) -> Configuration {
        Configuration {
            managed_repositories: members.iter()
                .map(|id| ManagedRepository::new(id, format!("/tmp/{}", id)))
                .collect(),
            repository_groups: vec![RepositoryGroup::new("public", members)],
            ..Default::default()
        }
    }

    #[test]
    fn test_merged_index_file_path() {
        let group = RepositoryGroup::new("public", &[]);
        assert_eq!(merged_index_file_path(&group, METADATA), ".indexer/org/example/lib/maven-metadata-public.xml");
        assert_eq!(merged_index_file_path(&group, "maven-metadata.xml"), ".indexer/maven-metadata-public.xml");
    }

    #[tokio::test]
    async fn test_first_member_wins() {
        let fixture = Fixture::new(configuration(&["a", "b"]));
        fixture.storage.storage("a").write(JAR, Bytes::from_static(b"from a")).await.unwrap();
        fixture.storage.storage("b").write(JAR, Bytes::from_static(b"from b")).await.unwrap();
        fixture.storage.storage("b").write("org/example/lib/2.0/lib-2.0.jar", Bytes::from_static(b"2.0 from b")).await.unwrap();

        assert_eq!(fixture.engine.resolve_group("public", JAR).await.unwrap().data.as_ref(), b"from a");
        assert_eq!(fixture.engine.resolve_group("public", "org/example/lib/2.0/lib-2.0.jar").await.unwrap().data.as_ref(), b"2.0 from b");
        assert!(matches!(fixture.engine.resolve_group("public", "org/example/lib/3.0/lib-3.0.jar").await, Err(ResolveError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let fixture = Fixture::new(configuration(&["a"]));
        assert!(matches!(fixture.engine.resolve_group("private", JAR).await, Err(ResolveError::UnknownRepository(_))));
    }

    #[tokio::test]
    async fn test_unknown_member_is_a_configuration_error() {
        let mut configuration = configuration(&["a"]);
        configuration.repository_groups = vec![RepositoryGroup::new("public", &["missing", "a"])];
        let fixture = Fixture::new(configuration);
        fixture.storage.storage("a").write(JAR, Bytes::from_static(b"from a")).await.unwrap();

        let result = fixture.engine.resolve_group("public", JAR).await;
        assert!(matches!(result, Err(ResolveError::Configuration(_))));
        assert_eq!(result.unwrap_err().status_code().as_u16(), 500);
    }

    #[tokio::test]
    async fn test_member_error_is_reported_if_nobody_has_the_file() {
        let mut configuration = configuration(&["a", "b"]);
        configuration.remote_repositories = vec![RemoteRepository::new("central", "https://repo.example.com/maven2")];
        configuration.proxy_connectors = vec![ProxyConnector::new("a", "central")];
        let fixture = Fixture::new(configuration);
        fixture.remote.fail("central", JAR, TransportError::Status(502));

        assert!(matches!(fixture.engine.resolve_group("public", JAR).await, Err(ResolveError::UpstreamTransport { .. })));

        fixture.storage.storage("b").write(JAR, Bytes::from_static(b"from b")).await.unwrap();
        assert_eq!(fixture.engine.resolve_group("public", JAR).await.unwrap().data.as_ref(), b"from b");
    }

    #[tokio::test]
    async fn test_metadata_is_merged() {
        let fixture = Fixture::new(configuration(&["a", "b"]));
        fixture.storage.storage("a").write(METADATA, Bytes::from(metadata_xml(&["1.0", "2.0"], "2.0"))).await.unwrap();
        fixture.storage.storage("b").write(METADATA, Bytes::from(metadata_xml(&["1.5", "2.0"], "2.0"))).await.unwrap();

        let resolved = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        let merged = Metadata::parse(&resolved.data).unwrap();
        assert_eq!(merged.versions(), &["1.0".to_string(), "1.5".to_string(), "2.0".to_string()]);
        assert_eq!(merged.versioning.as_ref().and_then(|v| v.latest.as_deref()), Some("2.0"));

        let sha1 = fixture.engine.resolve_group("public", &format!("{}.sha1", METADATA)).await.unwrap();
        assert_eq!(std::str::from_utf8(&sha1.data).unwrap(), ChecksumAlgorithm::Sha1.digest_hex(&resolved.data));

        let persisted = fixture.storage.storage("a")
            .read(".indexer/org/example/lib/maven-metadata-public.xml").await.unwrap().unwrap();
        assert_eq!(persisted.data, resolved.data);
        assert!(fixture.storage.storage("a").exists(".indexer/org/example/lib/maven-metadata-public.xml.md5").await.unwrap());
    }

    #[tokio::test]
    async fn test_unparsable_member_metadata_is_skipped() {
        let fixture = Fixture::new(configuration(&["a", "b"]));
        fixture.storage.storage("a").write(METADATA, Bytes::from_static(b"\xff\xfe<metadata/>")).await.unwrap();
        fixture.storage.storage("b").write(METADATA, Bytes::from(metadata_xml(&["1.5"], "1.5"))).await.unwrap();

        let resolved = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&resolved.data).unwrap().versions(), &["1.5".to_string()]);
    }

    #[tokio::test]
    async fn test_metadata_not_found_anywhere() {
        let fixture = Fixture::new(configuration(&["a", "b"]));
        assert!(matches!(fixture.engine.resolve_group("public", METADATA).await, Err(ResolveError::NotFound(_))));
        assert!(matches!(fixture.engine.resolve_group("public", &format!("{}.md5", METADATA)).await, Err(ResolveError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_merged_metadata_is_cached_until_ttl() {
        let fixture = Fixture::new(configuration(&["a"]));
        let storage = fixture.storage.storage("a");
        storage.write(METADATA, Bytes::from(metadata_xml(&["1.0"], "1.0"))).await.unwrap();

        let first = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        storage.write(METADATA, Bytes::from(metadata_xml(&["1.0", "2.0"], "2.0"))).await.unwrap();
        let second = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(first.data, second.data);

        let mut configuration = fixture.engine.snapshot().configuration().clone();
        configuration.repository_groups[0].merged_index_ttl_secs = 0;
        fixture.engine.reconfigure(configuration);

        let third = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&third.data).unwrap().versions().len(), 2);

        storage.write(METADATA, Bytes::from(metadata_xml(&["1.0", "2.0", "3.0"], "3.0"))).await.unwrap();
        let fourth = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&fourth.data).unwrap().versions().len(), 3);
    }

    #[tokio::test]
    async fn test_deploy_invalidates_merged_metadata() {
        let fixture = Fixture::new(configuration(&["a"]));
        fixture.engine.deploy("a", METADATA, Bytes::from(metadata_xml(&["1.0"], "1.0"))).await.unwrap();
        let first = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&first.data).unwrap().versions().len(), 1);

        fixture.engine.deploy("a", METADATA, Bytes::from(metadata_xml(&["1.0", "1.1"], "1.1"))).await.unwrap();
        let second = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&second.data).unwrap().versions().len(), 2);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = MergedMetadataCache::default();
        let merged = Arc::new(MergedMetadata::new("<metadata/>".to_string()));
        let generated_at = merged.generated_at;
        assert!(cache.insert("public", METADATA, merged, Duration::from_secs(10), cache.generation("public")));

        assert!(cache.get("public", METADATA, Duration::from_secs(10), generated_at + Duration::from_secs(9)).is_some());
        assert!(cache.get("public", METADATA, Duration::from_secs(10), generated_at + Duration::from_secs(10)).is_none());
        assert!(cache.get("other", METADATA, Duration::from_secs(10), generated_at).is_none());

        cache.invalidate_group("public");
        assert!(cache.get("public", METADATA, Duration::from_secs(10), generated_at).is_none());
    }

    #[test]
    fn test_cache_rejects_results_of_invalidated_generation() {
        let cache = MergedMetadataCache::default();
        let ttl = Duration::from_secs(10);
        let public = cache.generation("public");
        let internal = cache.generation("internal");

        cache.invalidate_group("public");
        assert!(!cache.insert("public", METADATA, Arc::new(MergedMetadata::new("<metadata/>".to_string())), ttl, public));
        assert!(cache.insert("internal", METADATA, Arc::new(MergedMetadata::new("<metadata/>".to_string())), ttl, internal));
        assert!(cache.insert("public", METADATA, Arc::new(MergedMetadata::new("<metadata/>".to_string())), ttl, cache.generation("public")));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.insert("internal", METADATA, Arc::new(MergedMetadata::new("<metadata/>".to_string())), ttl, internal));
    }

    #[test]
    fn test_cache_evicts_expired_entries() {
        let cache = MergedMetadataCache::default();
        let short = Arc::new(MergedMetadata::new("<metadata/>".to_string()));
        let generated_at = short.generated_at;
        cache.insert("public", "a/maven-metadata.xml", short, Duration::from_secs(10), cache.generation("public"));
        cache.insert("public", "b/maven-metadata.xml", Arc::new(MergedMetadata::new("<metadata/>".to_string())), Duration::from_secs(600), cache.generation("public"));

        cache.evict_expired(generated_at + Duration::from_secs(5));
        assert_eq!(cache.len(), 2);
        cache.evict_expired(generated_at + Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("public", "b/maven-metadata.xml", Duration::from_secs(600), generated_at + Duration::from_secs(60)).is_some());
    }

    #[tokio::test]
    async fn test_engine_housekeeping_drops_expired_merges() {
        let mut configuration = configuration(&["a"]);
        configuration.repository_groups[0].merged_index_ttl_secs = 0;
        let fixture = Fixture::new(configuration);
        let storage = fixture.storage.storage("a");
        for i in 0..5 {
            let path = format!("org/example/lib{}/maven-metadata.xml", i);
            storage.write(&path, Bytes::from(metadata_xml(&["1.0"], "1.0"))).await.unwrap();
            fixture.engine.resolve_group("public", &path).await.unwrap();
        }
        assert_eq!(fixture.engine.inner.merged_metadata.len(), 5);

        fixture.engine.evict_expired();
        assert!(fixture.engine.inner.merged_metadata.is_empty());
    }

    #[tokio::test]
    async fn test_deploy_during_merge_is_not_lost() {
        let mut configuration = configuration(&["a", "b"]);
        configuration.remote_repositories = vec![RemoteRepository::new("central", "https://repo.example.com/maven2")];
        configuration.proxy_connectors = vec![ProxyConnector::new("a", "central")];
        let fixture = Fixture::new(configuration);
        fixture.remote.put_with_checksums("central", METADATA, metadata_xml(&["1.0"], "1.0"));
        fixture.remote.set_delay(Duration::from_millis(200));

        let engine = fixture.engine.clone();
        let before = tokio::spawn(async move { engine.resolve_group("public", METADATA).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        fixture.engine.deploy("b", METADATA, Bytes::from(metadata_xml(&["2.0"], "2.0"))).await.unwrap();
        let during = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(Metadata::parse(&during.data).unwrap().versions(), &["1.0".to_string(), "2.0".to_string()]);

        before.await.unwrap().unwrap();
        let after = fixture.engine.resolve_group("public", METADATA).await.unwrap();
        assert_eq!(after.data, during.data);
    }
}

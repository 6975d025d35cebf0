use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::maven::coordinates::MavenArtifactRef;
use crate::maven::paths::{LayoutTranslator, RepositoryLayout};
use crate::policy::PolicySet;
use crate::util::path_pattern::PathFilter;

/// The configuration document as it is stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub managed_repositories: Vec<ManagedRepository>,
    #[serde(default)]
    pub remote_repositories: Vec<RemoteRepository>,
    #[serde(default)]
    pub proxy_connectors: Vec<ProxyConnector>,
    #[serde(default)]
    pub repository_groups: Vec<RepositoryGroup>,
    #[serde(default)]
    pub legacy_artifact_paths: Vec<LegacyArtifactPath>,
    #[serde(default)]
    pub failure_cache: FailureCacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}
impl Configuration {
    pub fn load(path: &Path) -> anyhow::Result<Configuration> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("failed to parse configuration file {}", path.display()))
    }

    pub fn parse(json: &str) -> anyhow::Result<Configuration> {
        Ok(serde_json::from_str(json)?)
    }
}

/// a repository held locally under this server's control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedRepository {
    pub id: String,
    #[serde(default)]
    pub layout: RepositoryLayout,
    pub location: PathBuf,
    #[serde(default = "default_true")]
    pub releases: bool,
    #[serde(default)]
    pub snapshots: bool,
    /// reject overwriting a release artifact that already exists
    #[serde(default)]
    pub block_redeployments: bool,
    #[serde(default)]
    pub scanned: bool,
}
impl ManagedRepository {
    pub fn new(id: &str, location: impl Into<PathBuf>) -> ManagedRepository {
        ManagedRepository {
            id: id.to_string(),
            layout: RepositoryLayout::Default,
            location: location.into(),
            releases: true,
            snapshots: false,
            block_redeployments: false,
            scanned: false,
        }
    }

    pub fn accepts(&self, artifact: &MavenArtifactRef) -> bool {
        if artifact.is_snapshot() {
            self.snapshots
        }
        else {
            self.releases
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// an upstream repository that is proxied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub layout: RepositoryLayout,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// path relative to `url` that is requested to test whether the remote is reachable
    #[serde(default)]
    pub check_path: Option<String>,
}
impl RemoteRepository {
    pub fn new(id: &str, url: &str) -> RemoteRepository {
        RemoteRepository {
            id: id.to_string(),
            url: url.to_string(),
            layout: RepositoryLayout::Default,
            credentials: None,
            timeout_secs: default_timeout_secs(),
            check_path: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConnector {
    /// managed repository id
    pub source: String,
    /// remote repository id
    pub target: String,
    /// ascending, 0 means 'unordered' and goes last
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub black_list: Vec<String>,
    #[serde(default)]
    pub white_list: Vec<String>,
    /// policy key -> option, see [crate::policy]
    #[serde(default)]
    pub policies: HashMap<String, String>,
}
impl ProxyConnector {
    pub fn new(source: &str, target: &str) -> ProxyConnector {
        ProxyConnector {
            source: source.to_string(),
            target: target.to_string(),
            order: 0,
            disabled: false,
            black_list: vec![],
            white_list: vec![],
            policies: HashMap::new(),
        }
    }

    pub fn with_order(mut self, order: u32) -> ProxyConnector {
        self.order = order;
        self
    }

    pub fn with_policy(mut self, key: &str, option: &str) -> ProxyConnector {
        self.policies.insert(key.to_string(), option.to_string());
        self
    }

    pub fn id(&self) -> String {
        format!("{}->{}", self.source, self.target)
    }
}

/// a virtual repository aggregating managed repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryGroup {
    pub id: String,
    /// managed repository ids in precedence order
    pub repositories: Vec<String>,
    #[serde(default = "default_merged_index_path")]
    pub merged_index_path: String,
    #[serde(default = "default_merged_index_ttl_secs")]
    pub merged_index_ttl_secs: u64,
}
impl RepositoryGroup {
    pub fn new(id: &str, repositories: &[&str]) -> RepositoryGroup {
        RepositoryGroup {
            id: id.to_string(),
            repositories: repositories.iter().map(|r| r.to_string()).collect(),
            merged_index_path: default_merged_index_path(),
            merged_index_ttl_secs: default_merged_index_ttl_secs(),
        }
    }

    pub fn merged_index_ttl(&self) -> Duration {
        Duration::from_secs(self.merged_index_ttl_secs)
    }
}

/// explicit mapping of a legacy layout path to `group:artifact:version:classifier:type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyArtifactPath {
    pub path: String,
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCacheConfig {
    #[serde(default = "default_failure_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_failure_max_entries")]
    pub max_entries: usize,
}
impl Default for FailureCacheConfig {
    fn default() -> Self {
        FailureCacheConfig {
            ttl_secs: default_failure_ttl_secs(),
            max_entries: default_failure_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { bind: default_bind() }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_merged_index_path() -> String {
    ".indexer".to_string()
}

fn default_merged_index_ttl_secs() -> u64 {
    30 * 60
}

fn default_failure_ttl_secs() -> u64 {
    30 * 60
}

fn default_failure_max_entries() -> usize {
    1000
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// A proxy connector with everything derived that resolution needs
#[derive(Debug, Clone)]
pub struct ConnectorRule {
    pub source: String,
    pub target: String,
    pub order: u32,
    pub disabled: bool,
    pub filter: PathFilter,
    pub policies: PolicySet,
}
impl ConnectorRule {
    fn compile(connector: &ProxyConnector) -> ConnectorRule {
        ConnectorRule {
            source: connector.source.clone(),
            target: connector.target.clone(),
            order: connector.order,
            disabled: connector.disabled,
            filter: PathFilter::new(&connector.black_list, &connector.white_list),
            policies: PolicySet::from_options(&connector.policies, &connector.id()),
        }
    }
}

/// Immutable, validated view of a [Configuration]. A new snapshot is derived for every
///  configuration change and swapped in atomically; resolution works against the snapshot
///  that was current when it started.
///
/// Problems are logged rather than rejected. References to repositories that do not exist
///  are kept so that requests using them fail loudly.
#[derive(Debug)]
pub struct ConfigSnapshot {
    configuration: Configuration,
    managed: HashMap<String, ManagedRepository>,
    remotes: HashMap<String, RemoteRepository>,
    groups: HashMap<String, RepositoryGroup>,
    connectors: HashMap<String, Vec<ConnectorRule>>,
    translator: LayoutTranslator,
}
impl ConfigSnapshot {
    pub fn build(configuration: Configuration) -> ConfigSnapshot {
        let managed = index_by_id(&configuration.managed_repositories, |r| &r.id, "managed repository");
        let remotes = index_by_id(&configuration.remote_repositories, |r| &r.id, "remote repository");
        let groups = index_by_id(&configuration.repository_groups, |g| &g.id, "repository group");

        let mut connectors: HashMap<String, Vec<ConnectorRule>> = HashMap::new();
        for connector in &configuration.proxy_connectors {
            if !managed.contains_key(&connector.source) {
                error!(connector = %connector.id(), "proxy connector references unknown managed repository {}", connector.source);
            }
            if !remotes.contains_key(&connector.target) {
                error!(connector = %connector.id(), "proxy connector references unknown remote repository {}", connector.target);
            }
            connectors.entry(connector.source.clone())
                .or_default()
                .push(ConnectorRule::compile(connector));
        }
        for rules in connectors.values_mut() {
            // stable: equal orders keep declaration order
            rules.sort_by_key(|c| (c.order == 0, c.order));
        }

        for group in groups.values() {
            for member in group.repositories.iter().filter(|m| !managed.contains_key(*m)) {
                error!(group = %group.id, "repository group references unknown managed repository {}", member);
            }
        }

        let translator = LayoutTranslator::with_legacy_overrides(
            configuration.legacy_artifact_paths.iter()
                .map(|p| (p.path.as_str(), p.artifact.as_str()))
        );

        ConfigSnapshot {
            configuration,
            managed,
            remotes,
            groups,
            connectors,
            translator,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn managed_repository(&self, id: &str) -> Option<&ManagedRepository> {
        self.managed.get(id)
    }

    pub fn remote_repository(&self, id: &str) -> Option<&RemoteRepository> {
        self.remotes.get(id)
    }

    pub fn group(&self, id: &str) -> Option<&RepositoryGroup> {
        self.groups.get(id)
    }

    /// connectors of a managed repository in evaluation order
    pub fn connectors_for(&self, managed_repository_id: &str) -> &[ConnectorRule] {
        self.connectors.get(managed_repository_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn groups_containing<'a>(&'a self, managed_repository_id: &'a str) -> impl Iterator<Item = &'a RepositoryGroup> + 'a {
        self.groups.values()
            .filter(move |g| g.repositories.iter().any(|r| r == managed_repository_id))
    }

    pub fn translator(&self) -> &LayoutTranslator {
        &self.translator
    }
}

/// first definition of an id wins
fn index_by_id<T: Clone>(items: &[T], id: impl Fn(&T) -> &String, kind: &str) -> HashMap<String, T> {
    let mut result = HashMap::new();
    for item in items {
        if result.contains_key(id(item)) {
            warn!("ignoring duplicate {} {}", kind, id(item));
            continue;
        }
        result.insert(id(item).clone(), item.clone());
    }
    result
}

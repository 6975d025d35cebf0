//! Per-connector policies, evaluated at three points of resolution: before fetching
//!  (`releases`, `snapshots`), after fetching (`checksum`) and on a failed fetch
//!  (`cache-failures`, `propagate-errors`, `propagate-errors-on-update`).
//!
//! Policies are configured as string key / option pairs. Keys and options are resolved
//!  through a fixed registry when the configuration is loaded: unknown keys are dropped and
//!  invalid options replaced by the policy's default, both with a warning.

pub mod checksum;
pub mod error_handling;
pub mod update;

use std::collections::HashMap;
use std::time::SystemTime;

use tracing::warn;

use crate::maven::paths::PathKind;
use crate::policy::checksum::ChecksumPolicy;
use crate::policy::error_handling::{error_handling, CacheFailures, ErrorHandling, PropagateErrors, PropagateErrorsOnUpdate};
use crate::policy::update::UpdatePolicy;

/// The closed set of options of one policy type
pub trait PolicyOption: Copy + PartialEq + 'static {
    const OPTIONS: &'static [(&'static str, Self)];

    /// case-insensitive
    fn parse(option: &str) -> Option<Self> {
        let option = option.trim();
        Self::OPTIONS.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(option))
            .map(|(_, value)| *value)
    }

    fn name(&self) -> &'static str {
        Self::OPTIONS.iter()
            .find(|(_, value)| value == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }
}

/// A single configured policy decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Releases(UpdatePolicy),
    Snapshots(UpdatePolicy),
    Checksum(ChecksumPolicy),
    CacheFailures(CacheFailures),
    PropagateErrors(PropagateErrors),
    PropagateErrorsOnUpdate(PropagateErrorsOnUpdate),
}
impl Policy {
    pub fn option_name(&self) -> &'static str {
        match self {
            Policy::Releases(p) | Policy::Snapshots(p) => p.name(),
            Policy::Checksum(p) => p.name(),
            Policy::CacheFailures(p) => p.name(),
            Policy::PropagateErrors(p) => p.name(),
            Policy::PropagateErrorsOnUpdate(p) => p.name(),
        }
    }
}

pub struct PolicyRegistration {
    pub key: &'static str,
    pub default: Policy,
    parse: fn(&str) -> Option<Policy>,
    options: fn() -> Vec<&'static str>,
}
impl PolicyRegistration {
    pub fn parse(&self, option: &str) -> Option<Policy> {
        (self.parse)(option)
    }

    pub fn options(&self) -> Vec<&'static str> {
        (self.options)()
    }
}

fn option_names<T: PolicyOption>() -> Vec<&'static str> {
    T::OPTIONS.iter().map(|(name, _)| *name).collect()
}

pub static REGISTRY: [PolicyRegistration; 6] = [
    PolicyRegistration {
        key: "releases",
        default: Policy::Releases(UpdatePolicy::Once),
        parse: |o| UpdatePolicy::parse(o).map(Policy::Releases),
        options: option_names::<UpdatePolicy>,
    },
    PolicyRegistration {
        key: "snapshots",
        default: Policy::Snapshots(UpdatePolicy::Daily),
        parse: |o| UpdatePolicy::parse(o).map(Policy::Snapshots),
        options: option_names::<UpdatePolicy>,
    },
    PolicyRegistration {
        key: "checksum",
        default: Policy::Checksum(ChecksumPolicy::Fix),
        parse: |o| ChecksumPolicy::parse(o).map(Policy::Checksum),
        options: option_names::<ChecksumPolicy>,
    },
    PolicyRegistration {
        key: "cache-failures",
        default: Policy::CacheFailures(CacheFailures::No),
        parse: |o| CacheFailures::parse(o).map(Policy::CacheFailures),
        options: option_names::<CacheFailures>,
    },
    PolicyRegistration {
        key: "propagate-errors",
        default: Policy::PropagateErrors(PropagateErrors::Queue),
        parse: |o| PropagateErrors::parse(o).map(Policy::PropagateErrors),
        options: option_names::<PropagateErrors>,
    },
    PolicyRegistration {
        key: "propagate-errors-on-update",
        default: Policy::PropagateErrorsOnUpdate(PropagateErrorsOnUpdate::NotPresent),
        parse: |o| PropagateErrorsOnUpdate::parse(o).map(Policy::PropagateErrorsOnUpdate),
        options: option_names::<PropagateErrorsOnUpdate>,
    },
];

pub fn registration(key: &str) -> Option<&'static PolicyRegistration> {
    REGISTRY.iter().find(|r| r.key.eq_ignore_ascii_case(key.trim()))
}

/// The effective policies of one proxy connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySet {
    pub releases: UpdatePolicy,
    pub snapshots: UpdatePolicy,
    pub checksum: ChecksumPolicy,
    pub cache_failures: CacheFailures,
    pub propagate_errors: PropagateErrors,
    pub propagate_errors_on_update: PropagateErrorsOnUpdate,
}
impl Default for PolicySet {
    fn default() -> Self {
        PolicySet {
            releases: UpdatePolicy::Once,
            snapshots: UpdatePolicy::Daily,
            checksum: ChecksumPolicy::Fix,
            cache_failures: CacheFailures::No,
            propagate_errors: PropagateErrors::Queue,
            propagate_errors_on_update: PropagateErrorsOnUpdate::NotPresent,
        }
    }
}
impl PolicySet {
    /// `connector` is only used for logging
    pub fn from_options(options: &HashMap<String, String>, connector: &str) -> PolicySet {
        let mut result = PolicySet::default();

        for (key, option) in options {
            let Some(registration) = registration(key) else {
                warn!(connector, key = %key, "ignoring unknown policy");
                continue;
            };
            match registration.parse(option) {
                Some(policy) => result.apply(policy),
                None => warn!(
                    connector,
                    policy = registration.key,
                    option = %option,
                    valid = ?registration.options(),
                    "invalid policy option, using default {}", registration.default.option_name()
                ),
            }
        }
        result
    }

    pub fn apply(&mut self, policy: Policy) {
        match policy {
            Policy::Releases(p) => self.releases = p,
            Policy::Snapshots(p) => self.snapshots = p,
            Policy::Checksum(p) => self.checksum = p,
            Policy::CacheFailures(p) => self.cache_failures = p,
            Policy::PropagateErrors(p) => self.propagate_errors = p,
            Policy::PropagateErrorsOnUpdate(p) => self.propagate_errors_on_update = p,
        }
    }

    /// Pre-fetch phase. Update policies only govern artifacts and their checksums; metadata
    ///  and other files are always eligible.
    pub fn should_fetch(&self, kind: &PathKind, local_last_modified: Option<SystemTime>, now: SystemTime) -> bool {
        match kind.artifact() {
            Some(artifact) if artifact.is_snapshot() => self.snapshots.should_fetch(local_last_modified, now),
            Some(_) => self.releases.should_fetch(local_last_modified, now),
            None => true,
        }
    }

    pub fn caches_failures(&self) -> bool {
        self.cache_failures == CacheFailures::Yes
    }

    /// On-error phase
    pub fn on_error(&self, local_copy_exists: bool) -> ErrorHandling {
        error_handling(self.propagate_errors, self.propagate_errors_on_update, local_copy_exists)
    }
}

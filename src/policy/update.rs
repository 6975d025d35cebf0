use std::time::{Duration, SystemTime};

use crate::policy::PolicyOption;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Pre-fetch decision for release (`releases`) and snapshot (`snapshots`) artifacts: whether
///  the remote is contacted, given the age of the local copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    Always,
    /// serve local copies only
    Never,
    /// fetch only if there is no local copy
    Once,
    Daily,
    Hourly,
}
impl PolicyOption for UpdatePolicy {
    const OPTIONS: &'static [(&'static str, UpdatePolicy)] = &[
        ("ALWAYS", UpdatePolicy::Always),
        ("NEVER", UpdatePolicy::Never),
        ("ONCE", UpdatePolicy::Once),
        ("DAILY", UpdatePolicy::Daily),
        ("HOURLY", UpdatePolicy::Hourly),
    ];
}
impl UpdatePolicy {
    pub fn should_fetch(&self, local_last_modified: Option<SystemTime>, now: SystemTime) -> bool {
        match self {
            UpdatePolicy::Always => true,
            UpdatePolicy::Never => false,
            UpdatePolicy::Once => local_last_modified.is_none(),
            UpdatePolicy::Daily => is_older_than(local_last_modified, now, DAY),
            UpdatePolicy::Hourly => is_older_than(local_last_modified, now, HOUR),
        }
    }
}

/// a local copy from the future is fresh
fn is_older_than(local_last_modified: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    match local_last_modified {
        None => true,
        Some(modified) => now.duration_since(modified)
            .map(|age| age > max_age)
            .unwrap_or(false),
    }
}

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailureKey {
    pub remote: String,
    pub path: String,
}
impl FailureKey {
    pub fn new(remote: &str, path: &str) -> FailureKey {
        FailureKey {
            remote: remote.to_string(),
            path: path.to_string(),
        }
    }
}

/// Remembers fetches that recently failed so that they are not attempted again until the
///  entry expires. Holds no content, only creation times.
///
/// An entry is expired once `now - created > ttl`. When there are more than `max_entries`
///  entries, the oldest are evicted until a tenth of the capacity is free again.
pub struct FailureCache {
    entries: DashMap<FailureKey, Instant>,
    ttl: Duration,
    max_entries: usize,
}
impl FailureCache {
    pub fn new(ttl: Duration, max_entries: usize) -> FailureCache {
        FailureCache {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn record(&self, key: FailureKey, now: Instant) {
        debug!(remote = %key.remote, path = %key.path, "caching failure");
        self.entries.insert(key, now);
        if self.entries.len() > self.max_entries {
            self.evict_expired_and_over_capacity(now);
        }
    }

    /// expired entries are removed on access
    pub fn is_live(&self, key: &FailureKey, now: Instant) -> bool {
        let created = match self.entries.get(key) {
            Some(created) => *created,
            None => return false,
        };

        if self.is_expired(created, now) {
            self.entries.remove_if(key, |_, c| self.is_expired(*c, now));
            return false;
        }
        true
    }

    pub fn evict_expired_and_over_capacity(&self, now: Instant) {
        self.entries.retain(|_, created| !self.is_expired(*created, now));

        if self.entries.len() <= self.max_entries {
            return;
        }
        let excess = self.entries.len() - self.compacted_size();

        let mut by_age: Vec<(FailureKey, Instant)> = self.entries.iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        by_age.sort_by_key(|(_, created)| *created);

        for (key, created) in by_age.into_iter().take(excess) {
            // an entry that was re-recorded in the meantime stays
            self.entries.remove_if(&key, |_, c| *c == created);
        }
        debug!(evicted = excess, remaining = self.entries.len(), "evicted failure cache entries over capacity");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compacted_size(&self) -> usize {
        self.max_entries - self.max_entries / 10
    }

    fn is_expired(&self, created: Instant, now: Instant) -> bool {
        now.saturating_duration_since(created) > self.ttl
    }
}

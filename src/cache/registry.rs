//! Per-group key registry.
//!
//! The object store cannot enumerate keys, so groups that need bulk
//! invalidation keep their own index: a JSON array of keys stored under
//! [`REGISTRY_KEY`] inside the group itself, with the same TTL as the data.
//!
//! `remember` is a plain read-modify-write without compare-and-swap. Two
//! concurrent writers may both read the same list and one of their keys is
//! then lost from the index. The lost entry is never flushed, but it carries
//! its own TTL and expires on schedule, so the leak is bounded by one TTL
//! window. A registry that cannot be decoded reads as empty.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use super::keys::CacheKey;
use super::store::ObjectStore;

/// Well-known key of the registry entry inside each group.
pub const REGISTRY_KEY: &str = "key_list";

const METRIC_FLUSH_TOTAL: &str = "tinycache_flush_total";

#[derive(Clone)]
pub struct KeyRegistry {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl KeyRegistry {
    /// `ttl` should match the TTL of the entries the registry indexes.
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Add `key` to the group's registry and write it back with a fresh TTL.
    pub fn remember(&self, group: &str, key: &CacheKey) {
        let mut keys = self.all_keys(group);
        keys.insert(key.as_str().to_string());

        let encoded = match serde_json::to_string(&keys) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(group, error = %err, "failed to encode key registry");
                return;
            }
        };

        match self.store.set(group, REGISTRY_KEY, encoded, self.ttl) {
            Ok(()) => debug!(group, key = %key, tracked = keys.len(), "key remembered"),
            Err(err) => warn!(group, key = %key, error = %err, "failed to write key registry"),
        }
    }

    /// Current, possibly incomplete, set of keys tracked for `group`.
    pub fn all_keys(&self, group: &str) -> BTreeSet<String> {
        let raw = match self.store.get(group, REGISTRY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeSet::new(),
            Err(err) => {
                warn!(group, error = %err, "failed to read key registry");
                return BTreeSet::new();
            }
        };

        match serde_json::from_str::<BTreeSet<String>>(&raw) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(group, error = %err, "malformed key registry treated as empty");
                BTreeSet::new()
            }
        }
    }

    /// Delete every tracked key of `group`, then the registry itself.
    ///
    /// Returns how many live entries were removed. Store failures are logged
    /// and skipped; entries that survive expire with their TTL.
    #[instrument(skip(self))]
    pub fn flush_all(&self, group: &str) -> usize {
        let keys = self.all_keys(group);
        let mut removed = 0;

        for key in &keys {
            match self.store.delete(group, key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(group, key = %key, error = %err, "failed to delete cached entry"),
            }
        }
        if let Err(err) = self.store.delete(group, REGISTRY_KEY) {
            warn!(group, error = %err, "failed to delete key registry");
        }

        counter!(METRIC_FLUSH_TOTAL, "group" => group.to_string()).increment(1);
        info!(group, tracked = keys.len(), removed, "cache group flushed");
        removed
    }
}

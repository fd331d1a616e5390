//! Object store collaborators.
//!
//! The cache core only needs get/set/add/delete on `(group, key)` pairs with a
//! per-entry TTL. There is no scan or enumerate operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store is unavailable")]
    Unavailable,
    #[error("object store backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Shared key-value store reachable by every request worker.
///
/// Calls are synchronous; timeouts belong to the implementation.
pub trait ObjectStore: Send + Sync {
    /// Whether a persistent store is configured and reachable.
    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, group: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional overwrite.
    fn set(&self, group: &str, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Write only when no live entry exists. Returns whether the write happened.
    fn add(&self, group: &str, key: &str, value: String, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Returns whether a live entry was removed.
    fn delete(&self, group: &str, key: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: Instant,
}

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Writes between two sweeps of expired entries.
const DEFAULT_SWEEP_EVERY: u64 = 1_024;

impl StoredEntry {
    fn new(value: String, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process store with per-entry expiry.
///
/// Expired entries are dropped lazily on access, and every `sweep_every`
/// writes a full [`MemoryStore::purge_expired`] pass reclaims entries that are
/// never read again.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<(String, String), StoredEntry>,
    writes: AtomicU64,
    sweep_every: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_every(DEFAULT_SWEEP_EVERY)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that sweeps expired entries after every `writes` writes (at least one).
    pub fn with_sweep_every(writes: u64) -> Self {
        Self {
            entries: DashMap::new(),
            writes: AtomicU64::new(0),
            sweep_every: writes.max(1),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    fn slot(group: &str, key: &str) -> (String, String) {
        (group.to_string(), key.to_string())
    }

    // Called after the write's map guard is released; `retain` locks every shard.
    fn note_write(&self) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.sweep_every == 0 {
            let removed = self.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = self.entries.len(), "expired entries swept");
            }
        }
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, group: &str, key: &str) -> Result<Option<String>, StoreError> {
        let slot = Self::slot(group, key);
        let now = Instant::now();
        match self.entries.get(&slot) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        // Expired: drop it unless a writer replaced it in the meantime.
        self.entries.remove_if(&slot, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    fn set(&self, group: &str, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(Self::slot(group, key), StoredEntry::new(value, ttl));
        self.note_write();
        Ok(())
    }

    fn add(
        &self,
        group: &str,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let written = match self.entries.entry(Self::slot(group, key)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(Instant::now()) {
                    false
                } else {
                    occupied.insert(StoredEntry::new(value, ttl));
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredEntry::new(value, ttl));
                true
            }
        };
        if written {
            self.note_write();
        }
        Ok(written)
    }

    fn delete(&self, group: &str, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(&Self::slot(group, key))
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }
}

/// Stand-in used when no persistent object store is configured.
///
/// Reports itself unavailable so every cache bypasses to direct computation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl ObjectStore for UnavailableStore {
    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _group: &str, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set(
        &self,
        _group: &str,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn add(
        &self,
        _group: &str,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn delete(&self, _group: &str, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }
}

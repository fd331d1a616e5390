//! Read-through fetch around a lazy producer.
//!
//! On a hit the stored value is returned unchanged. On a miss the producer runs
//! once and its output is written with add-if-absent, so the first writer of a
//! key wins and a concurrent fresher write is never clobbered. Concurrent misses
//! are not deduplicated: racing requests may each run the producer, which is
//! assumed to be pure.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::registry::KeyRegistry;
use super::store::ObjectStore;

const METRIC_HIT_TOTAL: &str = "tinycache_hit_total";
const METRIC_MISS_TOTAL: &str = "tinycache_miss_total";
const METRIC_STORE_WRITE_TOTAL: &str = "tinycache_store_write_total";

/// Placeholder replaced by the generation time in marker templates.
pub const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Producer output, tagged with whether it may be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Cacheable(String),
    /// Returned to the caller but never written to the store.
    Transient(String),
}

impl From<String> for Rendered {
    fn from(value: String) -> Self {
        Rendered::Cacheable(value)
    }
}

/// Generation marker appended to stored copies of HTML output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationMarker {
    template: Cow<'static, str>,
    echo_on_miss: bool,
}

impl GenerationMarker {
    /// Marker on stored copies only; the populating request gets the bare value.
    pub fn stored_only(template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            template: template.into(),
            echo_on_miss: false,
        }
    }

    /// Marker on stored copies and on the value returned by the populating request.
    pub fn echoed(template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            template: template.into(),
            echo_on_miss: true,
        }
    }

    pub fn render(&self, at: OffsetDateTime) -> String {
        let timestamp = at
            .format(&Rfc3339)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        self.template.replace(TIMESTAMP_PLACEHOLDER, &timestamp)
    }
}

pub type Clock = fn() -> OffsetDateTime;

/// Get-or-populate orchestration over an [`ObjectStore`].
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn ObjectStore>,
    marker: Option<GenerationMarker>,
    registry: Option<KeyRegistry>,
    clock: Clock,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            marker: None,
            registry: None,
            clock: OffsetDateTime::now_utc,
        }
    }

    pub fn with_marker(mut self, marker: GenerationMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Remember every populated key in `registry` so the group can be flushed.
    pub fn with_registry(mut self, registry: KeyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn registry(&self) -> Option<&KeyRegistry> {
        self.registry.as_ref()
    }

    /// Return the cached value for `key`, or run `producer` and store its output.
    pub fn fetch<F, E>(
        &self,
        group: &str,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        self.fetch_rendered(group, key, ttl, || producer().map(Rendered::Cacheable))
    }

    /// Like [`fetch`](Self::fetch), but the producer decides whether its output may be stored.
    pub fn fetch_rendered<F, E>(
        &self,
        group: &str,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<Rendered, E>,
    {
        if let Some(cached) = self.lookup(group, key) {
            return Ok(cached);
        }

        let value = match producer()? {
            Rendered::Transient(value) => {
                debug!(cache = group, key = %key, "transient output not stored");
                return Ok(value);
            }
            Rendered::Cacheable(value) => value,
        };

        let Some(marker) = &self.marker else {
            self.populate(group, key, ttl, value.clone());
            return Ok(value);
        };

        let marked = format!("{value}{}", marker.render((self.clock)()));
        if marker.echo_on_miss {
            self.populate(group, key, ttl, marked.clone());
            Ok(marked)
        } else {
            self.populate(group, key, ttl, marked);
            Ok(value)
        }
    }

    /// Typed variant for structured payloads stored as JSON.
    ///
    /// A cached payload that does not decode is treated as a miss and
    /// overwritten. No generation marker is applied.
    pub fn fetch_json<T, F, E>(
        &self,
        group: &str,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        let mut corrupted = false;
        if let Some(cached) = self.lookup(group, key) {
            match serde_json::from_str::<T>(&cached) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(cache = group, key = %key, error = %err, "undecodable cache entry treated as miss");
                    corrupted = true;
                }
            }
        }

        let value = producer()?;
        let encoded = match serde_json::to_string(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(cache = group, key = %key, error = %err, "failed to encode payload; not stored");
                return Ok(value);
            }
        };

        if corrupted {
            self.overwrite(group, key, ttl, encoded);
        } else {
            self.populate(group, key, ttl, encoded);
        }
        Ok(value)
    }

    fn lookup(&self, group: &str, key: &CacheKey) -> Option<String> {
        match self.store.get(group, key.as_str()) {
            Ok(Some(value)) => {
                debug!(cache = group, key = %key, outcome = "hit", "serving cached value");
                counter!(METRIC_HIT_TOTAL, "group" => group.to_string()).increment(1);
                Some(value)
            }
            Ok(None) => {
                debug!(cache = group, key = %key, outcome = "miss", "cache miss, running producer");
                counter!(METRIC_MISS_TOTAL, "group" => group.to_string()).increment(1);
                None
            }
            Err(err) => {
                warn!(cache = group, key = %key, error = %err, "cache read failed; computing directly");
                counter!(METRIC_MISS_TOTAL, "group" => group.to_string()).increment(1);
                None
            }
        }
    }

    /// Add-if-absent write, followed by key registration when configured.
    fn populate(&self, group: &str, key: &CacheKey, ttl: Duration, value: String) {
        let outcome = match self.store.add(group, key.as_str(), value, ttl) {
            Ok(true) => "stored",
            Ok(false) => "lost_race",
            Err(err) => {
                warn!(cache = group, key = %key, error = %err, "cache write failed");
                "failed"
            }
        };
        debug!(cache = group, key = %key, outcome, "cache populate");
        counter!(METRIC_STORE_WRITE_TOTAL, "group" => group.to_string(), "outcome" => outcome)
            .increment(1);

        if outcome != "failed" {
            self.register(group, key);
        }
    }

    fn overwrite(&self, group: &str, key: &CacheKey, ttl: Duration, value: String) {
        let outcome = match self.store.set(group, key.as_str(), value, ttl) {
            Ok(()) => "replaced",
            Err(err) => {
                warn!(cache = group, key = %key, error = %err, "cache overwrite failed");
                "failed"
            }
        };
        counter!(METRIC_STORE_WRITE_TOTAL, "group" => group.to_string(), "outcome" => outcome)
            .increment(1);

        if outcome != "failed" {
            self.register(group, key);
        }
    }

    fn register(&self, group: &str, key: &CacheKey) {
        if let Some(registry) = &self.registry {
            registry.remember(group, key);
        }
    }
}

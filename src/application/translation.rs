//! Translation catalog cache.
//!
//! Parsed catalogs are cached as JSON under a fingerprint of the text domain
//! and the catalog path. Loaded catalogs are merged into an explicit
//! [`Catalogs`] registry owned by the caller; entries already present for a
//! domain win over the newly loaded ones.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::cache::{CacheConfig, CacheKey, KeyBuilder, ObjectStore, ReadThroughCache};

pub const GROUP: &str = "mofile";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("catalog `{}` could not be read", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("catalog `{}` is malformed", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Headers and `msgid → msgstr` entries of one catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub headers: BTreeMap<String, String>,
    pub entries: BTreeMap<String, String>,
}

impl Catalog {
    /// Copy every entry of `other` over this catalog's entries.
    pub fn merge_with(&mut self, other: &Catalog) {
        for (msgid, msgstr) in &other.entries {
            self.entries.insert(msgid.clone(), msgstr.clone());
        }
    }

    pub fn translate(&self, msgid: &str) -> Option<&str> {
        self.entries.get(msgid).map(String::as_str)
    }
}

/// Catalogs loaded so far, by text domain.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    domains: BTreeMap<String, Catalog>,
}

impl Catalogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str) -> Option<&Catalog> {
        self.domains.get(domain)
    }

    pub fn is_loaded(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    /// Translation of `msgid` in `domain`, falling back to `msgid` itself.
    pub fn translate<'a>(&'a self, domain: &str, msgid: &'a str) -> &'a str {
        self.get(domain)
            .and_then(|catalog| catalog.translate(msgid))
            .unwrap_or(msgid)
    }

    /// Merge `loaded` into `domain`, keeping entries that were already present.
    pub fn merge(&mut self, domain: &str, mut loaded: Catalog) {
        if let Some(existing) = self.domains.get(domain) {
            loaded.merge_with(existing);
        }
        self.domains.insert(domain.to_string(), loaded);
    }
}

/// Parses catalog files. Parsing itself is outside the cache's concern.
pub trait CatalogLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Catalog, TranslationError>;
}

/// Loads catalogs stored as `{"headers": {...}, "entries": {...}}` JSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCatalogLoader;

impl CatalogLoader for JsonCatalogLoader {
    fn load(&self, path: &Path) -> Result<Catalog, TranslationError> {
        let raw = fs::read_to_string(path).map_err(|source| TranslationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| TranslationError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub struct TranslationCache<L = JsonCatalogLoader> {
    cache: ReadThroughCache,
    loader: L,
    ttl: Duration,
    enabled: bool,
}

impl TranslationCache<JsonCatalogLoader> {
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        Self::with_loader(store, config, JsonCatalogLoader)
    }
}

impl<L: CatalogLoader> TranslationCache<L> {
    pub fn with_loader(store: Arc<dyn ObjectStore>, config: &CacheConfig, loader: L) -> Self {
        let enabled = config.enabled && store.is_available();
        Self {
            cache: ReadThroughCache::new(store),
            loader,
            ttl: config.catalog_ttl,
            enabled,
        }
    }

    pub fn key_for(domain: &str, path: &Path) -> CacheKey {
        KeyBuilder::build(GROUP, [domain.as_bytes(), path.as_os_str().as_encoded_bytes()])
    }

    /// Load the catalog at `path` for `domain` and merge it into `catalogs`.
    ///
    /// On failure nothing is stored and `catalogs` is left untouched.
    #[instrument(skip(self, catalogs), fields(path = %path.display()))]
    pub fn load_textdomain(
        &self,
        catalogs: &mut Catalogs,
        domain: &str,
        path: &Path,
    ) -> Result<(), TranslationError> {
        let catalog = if self.enabled {
            let key = Self::key_for(domain, path);
            self.cache
                .fetch_json(GROUP, &key, self.ttl, || self.loader.load(path))?
        } else {
            self.loader.load(path)?
        };

        debug!(domain, entries = catalog.entries.len(), "catalog loaded");
        catalogs.merge(domain, catalog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{MemoryStore, UnavailableStore};

    struct CountingLoader {
        calls: AtomicUsize,
        catalog: Catalog,
    }

    impl CountingLoader {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                catalog: catalog(entries),
            }
        }
    }

    impl CatalogLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<Catalog, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.catalog.clone())
        }
    }

    fn catalog(entries: &[(&str, &str)]) -> Catalog {
        Catalog {
            headers: BTreeMap::from([("Language".to_string(), "de".to_string())]),
            entries: entries
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        }
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = TranslationCache::with_loader(
            store.clone(),
            &CacheConfig::default(),
            CountingLoader::new(&[("Hello", "Hallo")]),
        );
        let path = Path::new("/lang/demo-de.json");

        let mut first = Catalogs::new();
        cache.load_textdomain(&mut first, "demo", path).expect("first");
        let mut second = Catalogs::new();
        cache.load_textdomain(&mut second, "demo", path).expect("second");

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.translate("demo", "Hello"), "Hallo");
        let key = TranslationCache::<CountingLoader>::key_for("demo", path);
        assert!(store.get(GROUP, key.as_str()).expect("get").is_some());
    }

    #[test]
    fn existing_entries_take_precedence_on_merge() {
        let mut catalogs = Catalogs::new();
        catalogs.merge("demo", catalog(&[("Hello", "Servus")]));
        catalogs.merge("demo", catalog(&[("Hello", "Hallo"), ("Bye", "Tschüss")]));

        assert_eq!(catalogs.translate("demo", "Hello"), "Servus");
        assert_eq!(catalogs.translate("demo", "Bye"), "Tschüss");
        assert_eq!(catalogs.translate("demo", "Unknown"), "Unknown");
        assert_eq!(catalogs.translate("other", "Hello"), "Hello");
    }

    #[test]
    fn unavailable_store_loads_directly_every_time() {
        let cache = TranslationCache::with_loader(
            Arc::new(UnavailableStore),
            &CacheConfig::default(),
            CountingLoader::new(&[("Hello", "Hallo")]),
        );
        let mut catalogs = Catalogs::new();

        for _ in 0..2 {
            cache
                .load_textdomain(&mut catalogs, "demo", Path::new("/lang/demo.json"))
                .expect("load");
        }

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 2);
        assert!(catalogs.is_loaded("demo"));
    }

    #[test]
    fn keys_differ_by_domain_and_path() {
        type Cache = TranslationCache<JsonCatalogLoader>;
        let base = Cache::key_for("demo", Path::new("/a.json"));
        assert_ne!(base, Cache::key_for("other", Path::new("/a.json")));
        assert_ne!(base, Cache::key_for("demo", Path::new("/b.json")));
    }

    #[test]
    fn missing_file_is_unreadable_and_nothing_is_stored() {
        let store = Arc::new(MemoryStore::new());
        let cache = TranslationCache::new(store.clone(), &CacheConfig::default());
        let mut catalogs = Catalogs::new();

        let err = cache
            .load_textdomain(&mut catalogs, "demo", Path::new("/definitely/missing.json"))
            .expect_err("missing catalog");

        assert!(matches!(err, TranslationError::Unreadable { .. }));
        assert!(store.is_empty());
        assert!(!catalogs.is_loaded("demo"));
    }
}

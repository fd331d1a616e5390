//! Navigation menu fragment cache.
//!
//! A rendered menu depends on its rendering arguments and on the request path
//! (active-item highlighting), so both are part of the key. Such keys cannot be
//! derived from a mutated menu or post, hence every populated key is
//! remembered in the group registry and structural changes flush the group.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::cache::{
    CacheConfig, CacheKey, CacheabilityPolicy, EventName, InvalidationRule, KeyBuilder,
    KeyRegistry, ObjectStore, ReadThroughCache, RequestContext,
};

pub const GROUP: &str = "navmenu";

/// Events after which no cached menu can be trusted.
pub const INVALIDATION_RULES: &[InvalidationRule] = &[
    InvalidationRule::flush_group(EventName::PostSaved, 10, GROUP),
    InvalidationRule::flush_group(EventName::NavMenuCreated, 10, GROUP),
    InvalidationRule::flush_group(EventName::NavMenuUpdated, 10, GROUP),
    InvalidationRule::flush_group(EventName::NavMenuDeleted, 10, GROUP),
    InvalidationRule::flush_group(EventName::SharedTermSplit, 10, GROUP),
];

/// Rendering arguments of a menu. Every field is a variance axis of the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavMenuArgs {
    pub theme_location: String,
    pub menu_class: String,
    pub depth: u32,
}

impl NavMenuArgs {
    pub fn location(theme_location: impl Into<String>) -> Self {
        Self {
            theme_location: theme_location.into(),
            menu_class: "menu".to_string(),
            depth: 0,
        }
    }
}

#[derive(Clone)]
pub struct NavMenuCache {
    cache: ReadThroughCache,
    policy: CacheabilityPolicy,
    registry: KeyRegistry,
    ttl: Duration,
}

impl NavMenuCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        let policy =
            CacheabilityPolicy::fragment(store.as_ref(), config, config.navmenu_excludes.clone());
        let registry = KeyRegistry::new(store.clone(), config.navmenu_ttl);
        let cache = ReadThroughCache::new(store).with_registry(registry.clone());
        Self {
            cache,
            policy,
            registry,
            ttl: config.navmenu_ttl,
        }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Key for `args` rendered on `path`, or `None` if the arguments cannot be fingerprinted.
    pub fn key_for(args: &NavMenuArgs, path: &str) -> Option<CacheKey> {
        match serde_json::to_string(args) {
            Ok(fingerprint) => Some(KeyBuilder::build(
                GROUP,
                [fingerprint.as_bytes(), path.as_bytes()],
            )),
            Err(err) => {
                warn!(cache = GROUP, error = %err, "failed to fingerprint menu arguments");
                None
            }
        }
    }

    pub fn render<F, E>(
        &self,
        context: &RequestContext,
        args: &NavMenuArgs,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        let identity = Some(args.theme_location.as_str()).filter(|location| !location.is_empty());
        if self.policy.check(context, identity).is_err() {
            return producer();
        }
        let Some(key) = Self::key_for(args, context.path()) else {
            return producer();
        };
        self.cache.fetch(GROUP, &key, self.ttl, producer)
    }

    /// Drop every cached menu.
    pub fn flush(&self) -> usize {
        self.registry.flush_all(GROUP)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::cache::MemoryStore;

    fn menu_cache(excludes: &str) -> (Arc<MemoryStore>, NavMenuCache) {
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig {
            navmenu_excludes: CacheConfig::parse_excludes(excludes),
            ..Default::default()
        };
        (store.clone(), NavMenuCache::new(store, &config))
    }

    #[test]
    fn keys_vary_by_path_and_arguments() {
        let primary = NavMenuArgs::location("primary");
        let footer = NavMenuArgs::location("footer");

        let home = NavMenuCache::key_for(&primary, "/").expect("key");
        assert_eq!(Some(home.clone()), NavMenuCache::key_for(&primary, "/"));
        assert_ne!(Some(home.clone()), NavMenuCache::key_for(&primary, "/about"));
        assert_ne!(Some(home), NavMenuCache::key_for(&footer, "/"));
    }

    #[test]
    fn rendered_menus_are_cached_and_registered() {
        let (store, cache) = menu_cache("");
        let ctx = RequestContext::get("/");
        let args = NavMenuArgs::location("primary");
        let calls = Cell::new(0);
        let produce = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>("<ul/>".to_string())
        };

        cache.render(&ctx, &args, produce).expect("first");
        cache.render(&ctx, &args, produce).expect("second");

        assert_eq!(calls.get(), 1);
        let key = NavMenuCache::key_for(&args, "/").expect("key");
        assert!(cache.registry().all_keys(GROUP).contains(key.as_str()));
        assert!(store.get(GROUP, key.as_str()).expect("get").is_some());
    }

    #[test]
    fn flush_forces_repopulation() {
        let (_, cache) = menu_cache("");
        let ctx = RequestContext::get("/");
        let args = NavMenuArgs::location("primary");

        cache.render(&ctx, &args, || Ok::<_, ()>("v1".to_string())).expect("v1");
        assert_eq!(cache.flush(), 1);
        let html = cache.render(&ctx, &args, || Ok::<_, ()>("v2".to_string())).expect("v2");

        assert_eq!(html, "v2");
    }

    #[test]
    fn excluded_locations_are_never_cached() {
        let (store, cache) = menu_cache("footer|social");
        let ctx = RequestContext::get("/");

        cache
            .render(&ctx, &NavMenuArgs::location("footer"), || Ok::<_, ()>("<ul/>".to_string()))
            .expect("html");

        assert!(store.is_empty());
    }

    #[test]
    fn unlisted_query_parameters_bypass() {
        let (store, cache) = menu_cache("");
        let ctx = RequestContext::get("/").with_query([("ref", "123")]);

        cache
            .render(&ctx, &NavMenuArgs::location("primary"), || Ok::<_, ()>("<ul/>".to_string()))
            .expect("html");

        assert!(store.is_empty());
    }

    #[test]
    fn rules_flush_navmenu_group() {
        let events: Vec<EventName> = INVALIDATION_RULES.iter().map(|rule| rule.event).collect();
        assert!(events.contains(&EventName::PostSaved));
        assert!(events.contains(&EventName::NavMenuUpdated));
        assert!(events.contains(&EventName::SharedTermSplit));
        assert!(!events.contains(&EventName::PostDeleted));
    }
}

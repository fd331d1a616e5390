//! Post content and template part caches.
//!
//! Post content is keyed by post id alone and stored only for public posts.
//! The generation marker goes on the stored copy only, so the populating
//! request sees bare output and every later hit carries the marker.
//! Template parts are keyed by slug, optional name and a version and expire
//! after an hour; their marker is echoed on the populating request too.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{
    CacheConfig, CacheKey, CacheabilityPolicy, EventName, GenerationMarker, InvalidationRule,
    ObjectStore, ReadThroughCache, Rendered, RequestContext,
};
use crate::cache::read_through::Clock;
use crate::domain::entities::PostRecord;

pub const CONTENT_GROUP: &str = "the_content";
pub const TEMPLATE_PART_GROUP: &str = "template_part";

pub const CONTENT_MARKER: &str = "<!-- Cached content generated by Tiny cache on {timestamp} -->";
pub const TEMPLATE_PART_MARKER: &str = "<!-- Cached @{timestamp} -->";

/// Events that invalidate a single post's cached content.
pub const INVALIDATION_RULES: &[InvalidationRule] = &[
    InvalidationRule::delete_entity(EventName::PostSaved, 0, CONTENT_GROUP),
    InvalidationRule::delete_entity(EventName::PostEdited, 0, CONTENT_GROUP),
    InvalidationRule::delete_entity(EventName::PostDeleted, 0, CONTENT_GROUP),
    InvalidationRule::delete_entity(EventName::PostTrashed, 0, CONTENT_GROUP),
    InvalidationRule::delete_entity(EventName::PostCacheCleaned, 0, CONTENT_GROUP),
    InvalidationRule::delete_entity(EventName::PostStatusChanged, 10, CONTENT_GROUP),
];

/// Arguments that alter how post content renders.
///
/// They are not part of the content key, so anything but the defaults bypasses
/// the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderArgs {
    pub more_link_text: Option<String>,
    pub strip_teaser: bool,
}

impl RenderArgs {
    pub fn is_default(&self) -> bool {
        self.more_link_text.is_none() && !self.strip_teaser
    }
}

#[derive(Clone)]
pub struct ContentCache {
    cache: ReadThroughCache,
    policy: CacheabilityPolicy,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        let policy = CacheabilityPolicy::page(store.as_ref(), config);
        let mut cache = ReadThroughCache::new(store);
        if config.generation_marker {
            cache = cache.with_marker(GenerationMarker::stored_only(CONTENT_MARKER));
        }
        Self {
            cache,
            policy,
            ttl: config.content_ttl,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.cache = self.cache.with_clock(clock);
        self
    }

    pub fn policy(&self) -> &CacheabilityPolicy {
        &self.policy
    }

    /// Render `post` through the cache.
    ///
    /// A miss stores the output only when the post is public; drafts and
    /// password-protected posts are rendered fresh every time.
    pub fn render<F, E>(
        &self,
        context: &RequestContext,
        post: &PostRecord,
        args: &RenderArgs,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        if !args.is_default() {
            debug!(cache = CONTENT_GROUP, post_id = post.id, "custom render arguments bypass cache");
            return producer();
        }
        if !self.policy.evaluate(context) {
            return producer();
        }

        let key = CacheKey::from_id(post.id);
        let public = post.is_public();
        self.cache
            .fetch_rendered(CONTENT_GROUP, &key, self.ttl, || {
                producer().map(|html| {
                    if public {
                        Rendered::Cacheable(html)
                    } else {
                        Rendered::Transient(html)
                    }
                })
            })
    }
}

/// A template part reference: `slug`, optional `name`, and a version that ties
/// the rendering to the content it was produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePart<'a> {
    pub slug: &'a str,
    pub name: Option<&'a str>,
    pub version: Option<String>,
}

impl<'a> TemplatePart<'a> {
    pub fn new(slug: &'a str) -> Self {
        Self {
            slug,
            name: None,
            version: None,
        }
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn version(mut self, version: impl ToString) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// `{slug}[-{name}]:{version}`, or `None` when no version is known.
    pub fn key(&self) -> Option<CacheKey> {
        let version = self.version.as_deref()?;
        let suffix = self
            .name
            .filter(|name| !name.is_empty())
            .map(|name| format!("-{name}"))
            .unwrap_or_default();
        Some(CacheKey::from_raw(format!("{}{suffix}:{version}", self.slug)))
    }
}

#[derive(Clone)]
pub struct TemplatePartCache {
    cache: ReadThroughCache,
    policy: CacheabilityPolicy,
    ttl: Duration,
}

impl TemplatePartCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        let policy = CacheabilityPolicy::page(store.as_ref(), config);
        let mut cache = ReadThroughCache::new(store);
        if config.generation_marker {
            cache = cache.with_marker(GenerationMarker::echoed(TEMPLATE_PART_MARKER));
        }
        Self {
            cache,
            policy,
            ttl: config.template_part_ttl,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.cache = self.cache.with_clock(clock);
        self
    }

    pub fn render<F, E>(
        &self,
        context: &RequestContext,
        part: &TemplatePart<'_>,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        let Some(key) = part.key() else {
            debug!(cache = TEMPLATE_PART_GROUP, slug = part.slug, "unversioned template part bypasses cache");
            return producer();
        };
        if !self.policy.evaluate(context) {
            return producer();
        }
        self.cache.fetch(TEMPLATE_PART_GROUP, &key, self.ttl, producer)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use time::OffsetDateTime;
    use time::macros::datetime;

    use super::*;
    use crate::cache::{MemoryStore, PageKind, UnavailableStore};
    use crate::domain::types::PostStatus;

    fn fixed_clock() -> OffsetDateTime {
        datetime!(2024-05-01 12:00:00 UTC)
    }

    fn post(status: PostStatus, password: Option<&str>) -> PostRecord {
        PostRecord {
            id: 42,
            title: "Hello".to_string(),
            body_html: "Hello".to_string(),
            status,
            password: password.map(str::to_string),
        }
    }

    fn content_cache() -> (Arc<MemoryStore>, ContentCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = ContentCache::new(store.clone(), &CacheConfig::default()).with_clock(fixed_clock);
        (store, cache)
    }

    #[test]
    fn public_post_is_stored_with_marker_and_returned_bare() {
        let (store, cache) = content_cache();
        let ctx = RequestContext::get("/posts/42");
        let post = post(PostStatus::Published, None);

        let first = cache
            .render(&ctx, &post, &RenderArgs::default(), || Ok::<_, ()>("Hello".to_string()))
            .expect("first");
        let second = cache
            .render(&ctx, &post, &RenderArgs::default(), || Ok::<_, ()>("other".to_string()))
            .expect("second");

        let expected =
            "Hello<!-- Cached content generated by Tiny cache on 2024-05-01T12:00:00Z -->";
        assert_eq!(first, "Hello");
        assert_eq!(second, expected);
        assert_eq!(
            store.get(CONTENT_GROUP, "42").expect("get").as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn drafts_and_protected_posts_are_never_stored() {
        let (store, cache) = content_cache();
        let ctx = RequestContext::get("/posts/42");

        for post in [
            post(PostStatus::Draft, None),
            post(PostStatus::Published, Some("secret")),
        ] {
            let html = cache
                .render(&ctx, &post, &RenderArgs::default(), || Ok::<_, ()>("body".to_string()))
                .expect("html");
            assert_eq!(html, "body");
        }
        assert!(store.is_empty());
    }

    #[test]
    fn custom_render_arguments_bypass() {
        let (store, cache) = content_cache();
        let args = RenderArgs {
            more_link_text: Some("Continue".to_string()),
            strip_teaser: false,
        };

        cache
            .render(
                &RequestContext::get("/"),
                &post(PostStatus::Published, None),
                &args,
                || Ok::<_, ()>("teaser".to_string()),
            )
            .expect("html");

        assert!(store.is_empty());
    }

    #[test]
    fn ineligible_context_skips_store() {
        let (store, cache) = content_cache();
        let calls = Cell::new(0);
        let ctx = RequestContext::get("/posts/42").with_page(PageKind::Preview);

        for _ in 0..2 {
            cache
                .render(&ctx, &post(PostStatus::Published, None), &RenderArgs::default(), || {
                    calls.set(calls.get() + 1);
                    Ok::<_, ()>("fresh".to_string())
                })
                .expect("html");
        }

        assert_eq!(calls.get(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn unavailable_store_renders_directly() {
        let cache = ContentCache::new(Arc::new(UnavailableStore), &CacheConfig::default());
        assert!(!cache.policy().store_available());

        let html = cache
            .render(
                &RequestContext::get("/"),
                &post(PostStatus::Published, None),
                &RenderArgs::default(),
                || Ok::<_, ()>("direct".to_string()),
            )
            .expect("html");
        assert_eq!(html, "direct");
    }

    #[test]
    fn marker_can_be_disabled() {
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig {
            generation_marker: false,
            ..Default::default()
        };
        let cache = ContentCache::new(store.clone(), &config);

        cache
            .render(
                &RequestContext::get("/"),
                &post(PostStatus::Published, None),
                &RenderArgs::default(),
                || Ok::<_, ()>("plain".to_string()),
            )
            .expect("html");

        assert_eq!(store.get(CONTENT_GROUP, "42").expect("get").as_deref(), Some("plain"));
    }

    #[test]
    fn template_part_keys() {
        assert_eq!(
            TemplatePart::new("header").version(42).key().map(CacheKey::into_string),
            Some("header:42".to_string())
        );
        assert_eq!(
            TemplatePart::new("content").named("single").version("v2").key().map(CacheKey::into_string),
            Some("content-single:v2".to_string())
        );
        assert_eq!(TemplatePart::new("header").key(), None);
    }

    #[test]
    fn template_part_marker_is_echoed() {
        let store = Arc::new(MemoryStore::new());
        let cache = TemplatePartCache::new(store.clone(), &CacheConfig::default()).with_clock(fixed_clock);
        let part = TemplatePart::new("header").version(1);

        let html = cache
            .render(&RequestContext::get("/"), &part, || Ok::<_, ()>("<header/>".to_string()))
            .expect("html");

        assert_eq!(html, "<header/><!-- Cached @2024-05-01T12:00:00Z -->");
        assert_eq!(store.get(TEMPLATE_PART_GROUP, "header:1").expect("get"), Some(html));
    }

    #[test]
    fn unversioned_template_part_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = TemplatePartCache::new(store.clone(), &CacheConfig::default());

        cache
            .render(&RequestContext::get("/"), &TemplatePart::new("header"), || {
                Ok::<_, ()>("<header/>".to_string())
            })
            .expect("html");

        assert!(store.is_empty());
    }

    #[test]
    fn content_rules_delete_from_content_group() {
        assert!(INVALIDATION_RULES.iter().all(|rule| matches!(
            rule.action,
            crate::cache::InvalidationAction::DeleteEntity { group: CONTENT_GROUP }
        )));
        let transition = INVALIDATION_RULES
            .iter()
            .find(|rule| rule.event == EventName::PostStatusChanged)
            .expect("transition rule");
        assert_eq!(transition.priority, 10);
    }
}

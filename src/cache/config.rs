//! Cache configuration.
//!
//! Controls TTLs, excluded menu locations and the query-string whitelist via `tinycache.toml`.

use std::collections::BTreeSet;
use std::time::Duration;

// Default values for cache configuration
pub const DAY: Duration = Duration::from_secs(86_400);
pub const HOUR: Duration = Duration::from_secs(3_600);
/// Cookie-name prefix marking logged-in visitors.
pub const DEFAULT_AUTH_COOKIE_PREFIX: &str = "tinycache_logged_in";

/// Marketing and click-id parameters that must not fragment fragment caches.
pub const DEFAULT_QUERY_WHITELIST: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "gclid",
    "gbraid",
    "wbraid",
    "dclid",
    "fbclid",
    "msclkid",
    "twclid",
    "ttclid",
    "li_fat_id",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gl",
];

/// Cache configuration resolved from `tinycache.toml`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; disabled behaves like an unavailable store.
    pub enabled: bool,
    /// TTL for rendered post content.
    pub content_ttl: Duration,
    /// TTL for rendered template parts.
    pub template_part_ttl: Duration,
    /// TTL for navigation menu fragments and their key registry.
    pub navmenu_ttl: Duration,
    /// TTL for translation catalogs.
    pub catalog_ttl: Duration,
    /// Menu locations that are never cached.
    pub navmenu_excludes: BTreeSet<String>,
    /// Query parameters that do not disqualify fragment caching.
    pub query_whitelist: BTreeSet<String>,
    /// Append a generation marker comment to stored HTML.
    pub generation_marker: bool,
    /// Cookie-name prefix identifying logged-in visitors.
    pub auth_cookie_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_ttl: DAY,
            template_part_ttl: HOUR,
            navmenu_ttl: DAY,
            catalog_ttl: DAY,
            navmenu_excludes: BTreeSet::new(),
            query_whitelist: DEFAULT_QUERY_WHITELIST
                .iter()
                .map(|name| name.to_string())
                .collect(),
            generation_marker: true,
            auth_cookie_prefix: DEFAULT_AUTH_COOKIE_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            content_ttl: settings.content_ttl,
            template_part_ttl: settings.template_part_ttl,
            navmenu_ttl: settings.navmenu_ttl,
            catalog_ttl: settings.catalog_ttl,
            navmenu_excludes: settings.navmenu_excludes.clone(),
            query_whitelist: settings.query_whitelist.clone(),
            generation_marker: settings.generation_marker,
            auth_cookie_prefix: settings.auth_cookie_prefix.clone(),
        }
    }
}

impl CacheConfig {
    /// Parse a `|` delimited exclusion list, ignoring blanks.
    pub fn parse_excludes(raw: &str) -> BTreeSet<String> {
        raw.split('|')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

//! Per-request cacheability decisions.
//!
//! Biased toward correctness: anything ambiguous or stateful bypasses the cache
//! and the caller computes fresh output.

use std::collections::BTreeSet;
use std::fmt;

use axum::http::Method;
use metrics::counter;
use tracing::debug;

use super::config::CacheConfig;
use super::context::{PageKind, RequestContext};
use super::store::ObjectStore;

const METRIC_BYPASS_TOTAL: &str = "tinycache_bypass_total";

/// Why a request may not use the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bypass {
    StoreUnavailable,
    UnsafeMethod,
    NotThemedRender,
    Authenticated,
    SpecialPage(PageKind),
    DoNotCache,
    UnlistedQueryParameter(String),
    ExcludedIdentity(String),
}

impl Bypass {
    pub fn reason(&self) -> &'static str {
        match self {
            Bypass::StoreUnavailable => "store_unavailable",
            Bypass::UnsafeMethod => "unsafe_method",
            Bypass::NotThemedRender => "not_themed_render",
            Bypass::Authenticated => "authenticated",
            Bypass::SpecialPage(_) => "special_page",
            Bypass::DoNotCache => "do_not_cache",
            Bypass::UnlistedQueryParameter(_) => "unlisted_query_parameter",
            Bypass::ExcludedIdentity(_) => "excluded_identity",
        }
    }
}

impl fmt::Display for Bypass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bypass::SpecialPage(page) => write!(f, "special page `{}`", page.as_str()),
            Bypass::UnlistedQueryParameter(name) => write!(f, "unlisted query parameter `{name}`"),
            Bypass::ExcludedIdentity(identity) => write!(f, "excluded identity `{identity}`"),
            other => f.write_str(other.reason()),
        }
    }
}

/// Which checks apply beyond the common ones.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    /// Whole-entity content keyed by id; the query string does not vary output.
    Page,
    /// Context-dependent fragments; unknown query parameters fail closed.
    Fragment {
        query_whitelist: BTreeSet<String>,
        excluded: BTreeSet<String>,
    },
}

/// Pure decision over a request context plus static configuration.
///
/// Store availability is detected once, when the policy is built.
#[derive(Debug, Clone)]
pub struct CacheabilityPolicy {
    store_available: bool,
    scope: Scope,
}

impl CacheabilityPolicy {
    /// Policy for content keyed by entity id.
    pub fn page(store: &dyn ObjectStore, config: &CacheConfig) -> Self {
        Self {
            store_available: config.enabled && store.is_available(),
            scope: Scope::Page,
        }
    }

    /// Policy for context fragments, with a query whitelist and excluded identities.
    pub fn fragment(
        store: &dyn ObjectStore,
        config: &CacheConfig,
        excluded: BTreeSet<String>,
    ) -> Self {
        Self {
            store_available: config.enabled && store.is_available(),
            scope: Scope::Fragment {
                query_whitelist: config.query_whitelist.clone(),
                excluded,
            },
        }
    }

    pub fn store_available(&self) -> bool {
        self.store_available
    }

    /// Whether the request may use the cache at all.
    pub fn evaluate(&self, context: &RequestContext) -> bool {
        self.check(context, None).is_ok()
    }

    /// Like [`evaluate`](Self::evaluate), also matching `identity` against the exclusion list.
    pub fn evaluate_for(&self, context: &RequestContext, identity: &str) -> bool {
        self.check(context, Some(identity)).is_ok()
    }

    /// Full decision with the first failing reason. Bypasses are logged and counted.
    pub fn check(&self, context: &RequestContext, identity: Option<&str>) -> Result<(), Bypass> {
        let verdict = self.verdict(context, identity);
        if let Err(bypass) = &verdict {
            debug!(
                cache = "policy",
                outcome = "bypass",
                reason = bypass.reason(),
                detail = %bypass,
                path = context.path(),
                "cache bypassed"
            );
            counter!(METRIC_BYPASS_TOTAL, "reason" => bypass.reason()).increment(1);
        }
        verdict
    }

    fn verdict(&self, context: &RequestContext, identity: Option<&str>) -> Result<(), Bypass> {
        if !self.store_available {
            return Err(Bypass::StoreUnavailable);
        }
        if context.method() != Method::GET {
            return Err(Bypass::UnsafeMethod);
        }
        if !context.is_themed_render() {
            return Err(Bypass::NotThemedRender);
        }
        if context.is_authenticated() {
            return Err(Bypass::Authenticated);
        }
        if let Some(page) = context.pages().first() {
            return Err(Bypass::SpecialPage(*page));
        }
        if context.is_do_not_cache() {
            return Err(Bypass::DoNotCache);
        }

        if let Scope::Fragment {
            query_whitelist,
            excluded,
        } = &self.scope
        {
            if let Some((name, _)) = context
                .query()
                .iter()
                .find(|(name, _)| !query_whitelist.contains(name))
            {
                return Err(Bypass::UnlistedQueryParameter(name.clone()));
            }
            if let Some(identity) = identity.filter(|identity| excluded.contains(*identity)) {
                return Err(Bypass::ExcludedIdentity(identity.to_string()));
            }
        }

        Ok(())
    }
}

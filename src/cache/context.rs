//! Request context snapshot consulted by cacheability decisions and key derivation.

use axum::http::{HeaderMap, Method, Uri, header::AUTHORIZATION, header::COOKIE};

/// Request kinds whose output must never be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Search,
    NotFound,
    Feed,
    Trackback,
    Robots,
    Preview,
    PasswordRequired,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Search => "search",
            PageKind::NotFound => "not_found",
            PageKind::Feed => "feed",
            PageKind::Trackback => "trackback",
            PageKind::Robots => "robots",
            PageKind::Preview => "preview",
            PageKind::PasswordRequired => "password_required",
        }
    }
}

/// Immutable snapshot of the ambient request.
///
/// Built once per request, either from HTTP parts with [`RequestContext::from_http`]
/// or with the builder methods. Flags only known after routing (not-found,
/// password-protected) are added by the host with [`RequestContext::with_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    authenticated: bool,
    themed_render: bool,
    pages: Vec<PageKind>,
    do_not_cache: bool,
}

impl RequestContext {
    /// A themed, anonymous front-end request with no query string.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            authenticated: false,
            themed_render: true,
            pages: Vec::new(),
            do_not_cache: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Snapshot an HTTP request.
    ///
    /// A request counts as authenticated when it carries an `Authorization`
    /// header or a cookie whose name starts with `auth_cookie_prefix`.
    /// Robots, feed, search and preview requests are recognised from the URI.
    pub fn from_http(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        auth_cookie_prefix: &str,
    ) -> Self {
        let query: Vec<(String, String)> = uri
            .query()
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let mut context = Self::new(method.clone(), uri.path()).with_query(query);
        context.authenticated =
            headers.contains_key(AUTHORIZATION) || has_auth_cookie(headers, auth_cookie_prefix);

        let path = uri.path();
        if path == "/robots.txt" {
            context.pages.push(PageKind::Robots);
        }
        if path.ends_with("/feed") || path.ends_with("/feed/") || path.ends_with(".xml") {
            context.pages.push(PageKind::Feed);
        }
        if path.ends_with("/trackback") || path.ends_with("/trackback/") {
            context.pages.push(PageKind::Trackback);
        }
        if context.query_value("s").is_some() {
            context.pages.push(PageKind::Search);
        }
        if context
            .query_value("preview")
            .is_some_and(|value| value == "true" || value == "1")
        {
            context.pages.push(PageKind::Preview);
        }
        context
    }

    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Mark the request as not coming through the themed front-end renderer.
    pub fn unthemed(mut self) -> Self {
        self.themed_render = false;
        self
    }

    pub fn with_page(mut self, page: PageKind) -> Self {
        if !self.pages.contains(&page) {
            self.pages.push(page);
        }
        self
    }

    /// Raised by other subsystems that know the page must not be cached.
    pub fn do_not_cache(mut self) -> Self {
        self.do_not_cache = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_themed_render(&self) -> bool {
        self.themed_render
    }

    pub fn pages(&self) -> &[PageKind] {
        &self.pages
    }

    pub fn is_do_not_cache(&self) -> bool {
        self.do_not_cache
    }
}

fn has_auth_cookie(headers: &HeaderMap, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, _)| name.starts_with(prefix))
}

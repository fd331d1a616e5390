mod admin;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, put},
};

use crate::application::site::SiteService;

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<SiteService>,
    /// Cookie-name prefix marking logged-in visitors.
    pub auth_cookie_prefix: Arc<str>,
}

impl HttpState {
    pub fn new(site: Arc<SiteService>, auth_cookie_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            site,
            auth_cookie_prefix: auth_cookie_prefix.into(),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts/{id}", get(public::post_detail))
        .route("/robots.txt", get(public::robots))
        .route("/healthz", get(public::health))
        .route(
            "/admin/posts/{id}",
            put(admin::save_post).delete(admin::delete_post),
        )
        .route(
            "/admin/menus/{location}",
            put(admin::save_menu).delete(admin::delete_menu),
        )
        .fallback(public::not_found)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_id))
        .with_state(state)
}

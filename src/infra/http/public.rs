use axum::{
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
        header::CONTENT_TYPE,
    },
    response::{Html, IntoResponse, Response},
};
use tracing::instrument;

use crate::application::error::HttpError;
use crate::cache::RequestContext;
use crate::domain::entities::PostId;

use super::HttpState;

fn request_context(
    state: &HttpState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> RequestContext {
    RequestContext::from_http(method, uri, headers, &state.auth_cookie_prefix)
}

#[instrument(skip(state, headers))]
pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Path(id): Path<PostId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let context = request_context(&state, &method, &uri, &headers);
    match state.site.render_post(&context, id) {
        Ok(page) => Html(page).into_response(),
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state, headers))]
pub(super) async fn robots(
    State(state): State<HttpState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let context = request_context(&state, &method, &uri, &headers);
    match state.site.robots(&context) {
        Ok(body) => (
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(super) async fn not_found(uri: Uri) -> HttpError {
    HttpError::new(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no route for `{}`", uri.path()),
    )
}

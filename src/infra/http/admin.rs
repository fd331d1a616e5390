//! Admin writes. Each successful write dispatches domain events that
//! invalidate the affected cache entries before the response is sent.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::application::site::{MenuInput, PostInput};
use crate::domain::entities::PostId;

use super::HttpState;

#[instrument(skip(state, input))]
pub(super) async fn save_post(
    State(state): State<HttpState>,
    Path(id): Path<PostId>,
    Json(input): Json<PostInput>,
) -> Response {
    match state.site.save_post(id, input) {
        Ok(post) => Json(post).into_response(),
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state))]
pub(super) async fn delete_post(State(state): State<HttpState>, Path(id): Path<PostId>) -> Response {
    match state.site.delete_post(id) {
        Ok(post) => Json(post).into_response(),
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state, input))]
pub(super) async fn save_menu(
    State(state): State<HttpState>,
    Path(location): Path<String>,
    Json(input): Json<MenuInput>,
) -> Response {
    match state.site.save_menu(&location, input) {
        Ok(menu) => Json(menu).into_response(),
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(state))]
pub(super) async fn delete_menu(
    State(state): State<HttpState>,
    Path(location): Path<String>,
) -> Response {
    match state.site.delete_menu(&location) {
        Ok(menu) => Json(menu).into_response(),
        Err(err) => err.into_response(),
    }
}

//! Route definitions for the `/users` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Largest accepted avatar upload.
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// User routes. All require authentication.
///
/// ```text
/// GET  /users/me                  -> me
/// POST /users/{user_id}/avatar    -> upload_avatar (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", get(users::me)).route(
        "/users/{user_id}/avatar",
        post(users::upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES)),
    )
}

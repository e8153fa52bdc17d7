//! Route definitions for registration and token issuance.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Public authentication routes.
///
/// ```text
/// POST /register/        -> register
/// GET  /verify/{token}   -> verify
/// POST /token/           -> login (form body)
/// POST /token/refresh/   -> refresh (bearer refresh token)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(auth::register))
        .route("/verify/{token}", get(auth::verify))
        .route("/token/", post(auth::login))
        .route("/token/refresh/", post(auth::refresh))
}

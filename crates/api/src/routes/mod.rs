pub mod auth;
pub mod contacts;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the application route tree.
///
/// ```text
/// /register/                    register (public)
/// /verify/{token}               verify email (public)
/// /token/                       login (public)
/// /token/refresh/               refresh access token (refresh token)
///
/// /contacts/                    list, create
/// /contacts/search/             search
/// /contacts/upcoming_birthdays/ upcoming birthdays
/// /contacts/{id}                get, update, delete
///
/// /users/me                     current user
/// /users/{user_id}/avatar       upload avatar
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(contacts::router())
        .merge(users::router())
}

//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use contacts_core::types::DbId;
use contacts_db::models::user::User;
use contacts_db::repositories::UserRepo;

use crate::auth::jwt::{validate_token, TokenKind};
use crate::error::AppError;
use crate::state::AppState;

/// Message for every authentication failure on protected routes.
pub const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// The user behind a valid access token in the `Authorization` header.
///
/// Use this as an extractor parameter in any handler that requires authentication:
///
/// ```ignore
/// async fn my_handler(auth: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = auth.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.uid`).
    pub user_id: DbId,
    /// The user row as loaded for this request.
    pub user: User,
}

/// The token in an `Authorization: Bearer <token>` header, if present.
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let (scheme, token) = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .trim()
        .split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        let claims = validate_token(token, TokenKind::Access, &state.config.jwt)
            .map_err(|_| AppError::unauthorized(INVALID_CREDENTIALS))?;

        let user = UserRepo::find_by_id(&state.pool, claims.uid)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        Ok(AuthUser {
            user_id: user.id,
            user,
        })
    }
}

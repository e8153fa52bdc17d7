//! Handlers for registration, email verification and token issuance.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Form, Json};
use contacts_core::error::CoreError;
use contacts_core::tokens::{generate_verification_token, hash_token};
use contacts_core::validation::validate_input;
use contacts_db::models::user::CreateUser;
use contacts_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::{generate_access_token, generate_refresh_token, validate_token, TokenKind};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::bearer_token;
use crate::state::AppState;

const EMAIL_TAKEN: &str = "Email already registered";
const BAD_LOGIN: &str = "Incorrect username or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /register/`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password should be at least 8 characters long"))]
    pub password: String,
}

/// Form body for `POST /token/`. `username` carries the email address.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// `{ "msg": ... }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: &'static str,
}

/// Returned by a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Returned by a successful refresh.
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Canonical form of an email address used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /register/
///
/// Create an unverified account and mail its verification token. If the
/// mail cannot be sent the account is removed again so the address can be
/// registered once delivery works.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate_input(&input)?;
    let email = normalize_email(&input.email);

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::BadRequest(EMAIL_TAKEN.into()));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    let token = generate_verification_token();

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email,
            password_hash,
            verification_token_hash: token.hash,
        },
    )
    .await
    .map_err(|e| {
        // A concurrent registration of the same address lost the race.
        if is_unique_violation(&e, "uq_users_email") {
            AppError::BadRequest(EMAIL_TAKEN.into())
        } else {
            AppError::Database(e)
        }
    })?;

    if let Err(e) = state
        .mailer
        .send_verification(&user.email, &token.plaintext)
        .await
    {
        tracing::error!(user_id = user.id, error = %e, "Verification email failed");
        UserRepo::delete(&state.pool, user.id).await?;
        return Err(AppError::InternalError(format!(
            "Verification email could not be sent: {e}"
        )));
    }

    tracing::info!(user_id = user.id, "User registered");
    Ok(Json(MessageResponse {
        msg: "User created. Please check your email to verify your account.",
    }))
}

/// GET /verify/{token}
pub async fn verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let user = UserRepo::verify_by_token_hash(&state.pool, &hash_token(&token))
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid token".into()))?;

    tracing::info!(user_id = user.id, "Account verified");
    Ok(Json(MessageResponse {
        msg: "Account verified successfully",
    }))
}

/// POST /token/
///
/// Exchange email and password for an access and a refresh token.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let user = UserRepo::find_by_email(&state.pool, &normalize_email(&form.username))
        .await?
        .ok_or_else(|| AppError::unauthorized(BAD_LOGIN))?;

    let password_valid = verify_password(&form.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(AppError::unauthorized(BAD_LOGIN));
    }

    if !user.is_verified {
        return Err(AppError::Core(CoreError::Forbidden(
            "Email not verified".into(),
        )));
    }

    let jwt = &state.config.jwt;
    let access_token = generate_access_token(user.id, &user.email, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let refresh_token = generate_refresh_token(user.id, &user.email, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
    }))
}

/// POST /token/refresh/
///
/// Exchange the refresh token in the `Authorization` header for a new
/// access token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<AccessTokenResponse>> {
    let invalid = || AppError::unauthorized("Invalid refresh token");

    let token = bearer_token(&headers).ok_or_else(invalid)?;
    let claims =
        validate_token(token, TokenKind::Refresh, &state.config.jwt).map_err(|_| invalid())?;

    let user = UserRepo::find_by_id(&state.pool, claims.uid)
        .await?
        .ok_or_else(invalid)?;

    let access_token = generate_access_token(user.id, &user.email, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
    })
}

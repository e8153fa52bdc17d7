//! JWT access- and refresh-token generation and validation.
//!
//! Both token kinds are HS256-signed JWTs carrying a [`Claims`] payload. The
//! `typ` claim separates them so a long-lived refresh token can never be
//! presented as an access token, and vice versa.

use contacts_core::types::DbId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{get, parse_in_range_or, ConfigError, Lookup};

/// Which of the two token kinds a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's email address.
    pub sub: String,
    /// The user's internal database id.
    pub uid: DbId,
    /// Token kind.
    pub typ: TokenKind,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
pub const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
pub const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;
/// Longest accepted access token lifetime (one week).
pub const MAX_ACCESS_EXPIRY_MINS: i64 = 7 * 24 * 60;
/// Longest accepted refresh token lifetime (one year).
pub const MAX_REFRESH_EXPIRY_DAYS: i64 = 365;

impl JwtConfig {
    /// Load JWT configuration.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// Lifetimes must be at least 1 and at most [`MAX_ACCESS_EXPIRY_MINS`] /
    /// [`MAX_REFRESH_EXPIRY_DAYS`].
    ///
    /// `SECRET_KEY` is accepted in place of `JWT_SECRET` for `.env` files
    /// written for earlier deployments.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let secret = match get(lookup, "JWT_SECRET") {
            Some(secret) => secret,
            None => get(lookup, "SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET"))?,
        };

        Ok(Self {
            secret,
            access_token_expiry_mins: parse_in_range_or(
                lookup,
                "JWT_ACCESS_EXPIRY_MINS",
                DEFAULT_ACCESS_EXPIRY_MINS,
                1..=MAX_ACCESS_EXPIRY_MINS,
            )?,
            refresh_token_expiry_days: parse_in_range_or(
                lookup,
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
                1..=MAX_REFRESH_EXPIRY_DAYS,
            )?,
        })
    }

    /// Token lifetime, clamped to the configured bounds for values set
    /// directly on the struct.
    fn lifetime_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_token_expiry_mins.clamp(1, MAX_ACCESS_EXPIRY_MINS) * 60,
            TokenKind::Refresh => {
                self.refresh_token_expiry_days.clamp(1, MAX_REFRESH_EXPIRY_DAYS) * 24 * 60 * 60
            }
        }
    }
}

/// Sign a token of the given kind for a user.
pub fn generate_token(
    kind: TokenKind,
    user_id: DbId,
    email: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();

    let claims = Claims {
        sub: email.to_string(),
        uid: user_id,
        typ: kind,
        exp: now + config.lifetime_secs(kind),
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Generate a short-lived access token.
pub fn generate_access_token(
    user_id: DbId,
    email: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    generate_token(TokenKind::Access, user_id, email, config)
}

/// Generate a long-lived refresh token.
pub fn generate_refresh_token(
    user_id: DbId,
    email: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    generate_token(TokenKind::Refresh, user_id, email, config)
}

/// Validate and decode a token, requiring it to be of `expected` kind.
///
/// Validates the signature and expiration; a token of the other kind fails
/// with [`ErrorKind::InvalidToken`].
pub fn validate_token(
    token: &str,
    expected: TokenKind,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    if token_data.claims.typ != expected {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(token_data.claims)
}

use std::num::NonZeroU32;
use std::ops::RangeInclusive;
use std::str::FromStr;

use axum::http::HeaderValue;

use crate::auth::jwt::JwtConfig;
use crate::avatar::CloudinaryConfig;
use crate::mail::MailConfig;
use crate::rate_limit::DEFAULT_CONTACT_CREATE_PER_MINUTE;

/// Reads one configuration variable. `std::env::var` in production, a map in
/// tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// A configuration variable is missing or unparsable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Externally reachable base URL, used in verification emails.
    pub public_base_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Initial database connection attempts before giving up (default: `10`).
    pub db_connect_retries: u32,
    /// Contact creations allowed per client IP per minute (default: `5`).
    pub contact_create_per_minute: NonZeroU32,
    /// Use the first `X-Forwarded-For` entry as the client address. Only
    /// enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// SMTP settings; `None` logs verification mail instead of sending it.
    pub mail: Option<MailConfig>,
    /// Avatar host credentials; `None` disables avatar upload.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, applying defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `8000`                  |
    /// | `PUBLIC_BASE_URL`           | `http://localhost:8000` |
    /// | `CORS_ORIGINS`              | `http://localhost:8000` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `DB_CONNECT_RETRIES`        | `10`                    |
    /// | `CONTACT_CREATE_PER_MINUTE` | `5`                     |
    /// | `TRUST_FORWARDED_FOR`       | `false`                 |
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = get(lookup, "HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(lookup, "PORT", 8000u16)?;

        let public_base_url = get(lookup, "PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".into())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = get(lookup, "CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:8000".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            host,
            port,
            public_base_url,
            cors_origins,
            request_timeout_secs: parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30u64)?,
            db_connect_retries: parse_or(lookup, "DB_CONNECT_RETRIES", 10u32)?,
            contact_create_per_minute: parse_or(
                lookup,
                "CONTACT_CREATE_PER_MINUTE",
                DEFAULT_CONTACT_CREATE_PER_MINUTE,
            )?,
            trust_forwarded_for: parse_bool_or(lookup, "TRUST_FORWARDED_FOR", false)?,
            jwt: JwtConfig::from_lookup(lookup)?,
            mail: MailConfig::from_lookup(lookup)?,
            cloudinary: CloudinaryConfig::from_lookup(lookup),
        })
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers shared by the per-concern config structs
// ---------------------------------------------------------------------------

/// The trimmed value of `var`, treating empty as unset.
pub(crate) fn get(lookup: Lookup<'_>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The value of `var` or [`ConfigError::Missing`].
pub(crate) fn required(lookup: Lookup<'_>, var: &'static str) -> Result<String, ConfigError> {
    get(lookup, var).ok_or(ConfigError::Missing(var))
}

/// Parse `var` when set, otherwise return `default`.
pub(crate) fn parse_or<T: FromStr>(
    lookup: Lookup<'_>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(lookup, var) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

/// Parse `var` when set, otherwise return `default`. Values outside
/// `range` are [`ConfigError::Invalid`].
pub(crate) fn parse_in_range_or<T>(
    lookup: Lookup<'_>,
    var: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + ToString,
{
    let value = parse_or(lookup, var, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        })
    }
}

/// Parse a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`).
pub(crate) fn parse_bool_or(
    lookup: Lookup<'_>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(lookup, var) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value: raw }),
        },
        None => Ok(default),
    }
}

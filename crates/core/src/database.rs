//! PostgreSQL connection settings shared by the `db` container and the service.
//!
//! The database container is initialized from `POSTGRES_*` variables while the
//! service connects through a `DATABASE_URL` assembled from the same values.
//! [`drift`] reports every field where the two disagree so a stale `.env`
//! fails at startup instead of on the first query.
//!
//! URLs may use the driver-qualified scheme the compose file has always
//! carried (`postgresql+psycopg2://`); [`normalize_url`] rewrites it to the
//! `postgres://` form the driver accepts.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

/// Port used when neither `POSTGRES_PORT` nor the URL names one.
pub const DEFAULT_PORT: u16 = 5432;

/// Scheme understood by the Postgres driver.
pub const DRIVER_SCHEME: &str = "postgres";

/// Environment variable names shared with the database container.
pub mod vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const DB: &str = "POSTGRES_DB";
    pub const USER: &str = "POSTGRES_USER";
    pub const PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const PORT: &str = "POSTGRES_PORT";
    pub const HOST: &str = "POSTGRES_HOST";
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),

    #[error("{var} must be a valid port number, got '{value}'")]
    InvalidPort { var: &'static str, value: String },

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported database URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Database URL is missing the {0}")]
    MissingUrlPart(&'static str),

    #[error("DATABASE_URL does not match the POSTGRES_* settings: {}", join_drift(.0))]
    Drift(Vec<Drift>),
}

fn join_drift(drift: &[Drift]) -> String {
    drift
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The individual parts of a Postgres connection.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseSettings {
    /// Build settings from `POSTGRES_*` variables.
    ///
    /// `POSTGRES_HOST` is optional and falls back to `default_host`;
    /// `POSTGRES_PORT` falls back to [`DEFAULT_PORT`]. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F, default_host: &str) -> Result<Self, DatabaseConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(DatabaseConfigError::MissingVar(var));

        let port: u16 = match get(vars::PORT) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| DatabaseConfigError::InvalidPort {
                    var: vars::PORT,
                    value: raw.clone(),
                })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: get(vars::HOST).unwrap_or_else(|| default_host.to_string()),
            port,
            user: required(vars::USER)?,
            password: required(vars::PASSWORD)?,
            name: required(vars::DB)?,
        })
    }

    /// Render as a `postgres://` URL with user, password and database name
    /// percent-encoded.
    pub fn to_url(&self) -> String {
        format!(
            "{DRIVER_SCHEME}://{}:{}@{}:{}/{}",
            encode(&self.user),
            encode(&self.password),
            self.host,
            self.port,
            encode(&self.name),
        )
    }

    /// Parse a connection URL into its parts.
    pub fn parse_url(raw: &str) -> Result<Self, DatabaseConfigError> {
        let url = parse_postgres_url(raw)?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(DatabaseConfigError::MissingUrlPart("host"))?;

        let user = decode(url.username())?;
        if user.is_empty() {
            return Err(DatabaseConfigError::MissingUrlPart("user"));
        }

        let password = match url.password() {
            Some(p) => decode(p)?,
            None => String::new(),
        };
        if password.is_empty() {
            return Err(DatabaseConfigError::MissingUrlPart("password"));
        }

        let name = decode(url.path().trim_start_matches('/'))?;
        if name.is_empty() {
            return Err(DatabaseConfigError::MissingUrlPart("database name"));
        }

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            user,
            password,
            name,
        })
    }
}

/// Rewrite any accepted scheme to [`DRIVER_SCHEME`], keeping every other part
/// of the URL (including query parameters such as `sslmode`).
pub fn normalize_url(raw: &str) -> Result<String, DatabaseConfigError> {
    let mut url = parse_postgres_url(raw)?;
    if url.scheme() != DRIVER_SCHEME {
        let original = url.scheme().to_string();
        url.set_scheme(DRIVER_SCHEME)
            .map_err(|()| DatabaseConfigError::UnsupportedScheme(original))?;
    }
    Ok(url.to_string())
}

/// `postgres`, `postgresql`, or a driver-qualified `postgresql+<driver>`.
pub fn is_supported_scheme(scheme: &str) -> bool {
    match scheme {
        "postgres" | "postgresql" => true,
        other => other
            .strip_prefix("postgresql+")
            .is_some_and(|driver| !driver.is_empty()),
    }
}

fn parse_postgres_url(raw: &str) -> Result<Url, DatabaseConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| DatabaseConfigError::InvalidUrl(e.to_string()))?;
    if !is_supported_scheme(url.scheme()) {
        return Err(DatabaseConfigError::UnsupportedScheme(
            url.scheme().to_string(),
        ));
    }
    Ok(url)
}

fn encode(part: &str) -> String {
    utf8_percent_encode(part, NON_ALPHANUMERIC).to_string()
}

fn decode(part: &str) -> Result<String, DatabaseConfigError> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| DatabaseConfigError::InvalidUrl(e.to_string()))
}

// ---------------------------------------------------------------------------
// Drift detection
// ---------------------------------------------------------------------------

/// A connection field that both sources define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftField {
    Name,
    User,
    Password,
    Port,
}

impl DriftField {
    /// The `POSTGRES_*` variable holding this field.
    pub fn env_var(self) -> &'static str {
        match self {
            DriftField::Name => vars::DB,
            DriftField::User => vars::USER,
            DriftField::Password => vars::PASSWORD,
            DriftField::Port => vars::PORT,
        }
    }
}

/// One mismatch between `DATABASE_URL` and the `POSTGRES_*` variables.
#[derive(Clone, PartialEq, Eq)]
pub struct Drift {
    pub field: DriftField,
    pub url_value: String,
    pub env_value: String,
}

impl fmt::Debug for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Drift({self})")
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            DriftField::Password => write!(f, "password differs from {}", vars::PASSWORD),
            field => write!(
                f,
                "URL has '{}' but {} is '{}'",
                self.url_value,
                field.env_var(),
                self.env_value
            ),
        }
    }
}

/// List every field whose value differs between the two settings.
///
/// The host is not compared: inside the compose network the service reaches
/// the database as `db`, while `POSTGRES_HOST` usually names the published
/// address.
pub fn drift(from_url: &DatabaseSettings, from_env: &DatabaseSettings) -> Vec<Drift> {
    let pairs = [
        (DriftField::Name, &from_url.name, &from_env.name),
        (DriftField::User, &from_url.user, &from_env.user),
        (DriftField::Password, &from_url.password, &from_env.password),
    ];

    let mut out: Vec<Drift> = pairs
        .into_iter()
        .filter(|(_, url_value, env_value)| url_value != env_value)
        .map(|(field, url_value, env_value)| Drift {
            field,
            url_value: url_value.clone(),
            env_value: env_value.clone(),
        })
        .collect();

    if from_url.port != from_env.port {
        out.push(Drift {
            field: DriftField::Port,
            url_value: from_url.port.to_string(),
            env_value: from_env.port.to_string(),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Where the connection URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    /// `DATABASE_URL` was set and matched the `POSTGRES_*` variables.
    ExplicitChecked,
    /// `DATABASE_URL` was set but the `POSTGRES_*` variables were incomplete,
    /// so no comparison was possible.
    ExplicitUnchecked,
    /// Assembled from the `POSTGRES_*` variables.
    Assembled,
}

/// A driver-ready connection URL plus its provenance.
#[derive(Clone)]
pub struct ResolvedDatabase {
    pub url: String,
    pub source: UrlSource,
    pub settings: DatabaseSettings,
}

impl fmt::Debug for ResolvedDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDatabase")
            .field("source", &self.source)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Work out the connection URL from the environment.
///
/// When `DATABASE_URL` is set it wins, but if the `POSTGRES_*` variables are
/// also complete they must agree with it ([`DatabaseConfigError::Drift`]
/// otherwise). Without `DATABASE_URL` the URL is assembled from the
/// `POSTGRES_*` variables.
pub fn resolve<F>(lookup: F, default_host: &str) -> Result<ResolvedDatabase, DatabaseConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = lookup(vars::DATABASE_URL).filter(|v| !v.trim().is_empty());
    let from_env = DatabaseSettings::from_lookup(&lookup, default_host);

    let Some(raw) = explicit else {
        let settings = from_env?;
        return Ok(ResolvedDatabase {
            url: settings.to_url(),
            source: UrlSource::Assembled,
            settings,
        });
    };

    let from_url = DatabaseSettings::parse_url(&raw)?;
    let url = normalize_url(&raw)?;

    let source = match from_env {
        Ok(env_settings) => {
            let mismatches = drift(&from_url, &env_settings);
            if !mismatches.is_empty() {
                return Err(DatabaseConfigError::Drift(mismatches));
            }
            UrlSource::ExplicitChecked
        }
        Err(DatabaseConfigError::MissingVar(_)) => UrlSource::ExplicitUnchecked,
        Err(e) => return Err(e),
    };

    Ok(ResolvedDatabase {
        url,
        source,
        settings: from_url,
    })
}

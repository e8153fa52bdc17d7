//! Verification email delivery.
//!
//! [`Mailer`] is the seam handlers talk to. [`SmtpMailer`] sends through
//! `lettre` using the `MAIL_*` settings; [`LogMailer`] is used when no SMTP
//! server is configured and only writes the token to the log.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{get, parse_bool_or, parse_or, required, ConfigError, Lookup};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// MailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (implicit TLS).
const DEFAULT_MAIL_PORT: u16 = 465;

/// SMTP settings for outgoing mail.
#[derive(Clone)]
pub struct MailConfig {
    /// SMTP server hostname.
    pub server: String,
    /// SMTP server port.
    pub port: u16,
    /// RFC 5322 "From" address.
    pub from: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Implicit TLS when `true`, STARTTLS otherwise.
    pub ssl_tls: bool,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("username", &self.username)
            .field("ssl_tls", &self.ssl_tls)
            .finish_non_exhaustive()
    }
}

impl MailConfig {
    /// Load SMTP settings.
    ///
    /// Returns `Ok(None)` if `MAIL_SERVER` is not set, signalling that mail
    /// should be logged rather than sent.
    ///
    /// | Variable        | Required           | Default |
    /// |-----------------|--------------------|---------|
    /// | `MAIL_SERVER`   | enables SMTP       | --      |
    /// | `MAIL_FROM`     | with `MAIL_SERVER` | --      |
    /// | `MAIL_PORT`     | no                 | `465`   |
    /// | `MAIL_USERNAME` | no                 | --      |
    /// | `MAIL_PASSWORD` | no                 | --      |
    /// | `MAIL_SSL_TLS`  | no                 | `true`  |
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(server) = get(lookup, "MAIL_SERVER") else {
            return Ok(None);
        };

        Ok(Some(Self {
            server,
            port: parse_or(lookup, "MAIL_PORT", DEFAULT_MAIL_PORT)?,
            from: required(lookup, "MAIL_FROM")?,
            username: get(lookup, "MAIL_USERNAME"),
            password: get(lookup, "MAIL_PASSWORD"),
            ssl_tls: parse_bool_or(lookup, "MAIL_SSL_TLS", true)?,
        }))
    }
}

// ---------------------------------------------------------------------------
// Message content
// ---------------------------------------------------------------------------

/// Subject line of the verification email.
pub const VERIFICATION_SUBJECT: &str = "Email Verification";

/// Link the user can open to verify their account.
pub fn verification_link(public_base_url: &str, token: &str) -> String {
    format!("{public_base_url}/verify/{token}")
}

/// HTML body of the verification email.
pub fn verification_body(public_base_url: &str, token: &str) -> String {
    let link = verification_link(public_base_url, token);
    format!(
        "<p>Your verification token is: <code>{token}</code></p>\
         <p>Or open <a href=\"{link}\">{link}</a> to verify your account.</p>"
    )
}

// ---------------------------------------------------------------------------
// Mailer implementations
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the one-time verification token to a newly registered address.
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailError>;
}

/// Sends mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    public_base_url: String,
}

impl SmtpMailer {
    /// Build the transport once; connections are pooled by `lettre`.
    pub fn new(config: &MailConfig, public_base_url: &str) -> Result<Self, MailError> {
        let builder = if config.ssl_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        };
        let mut builder = builder.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
            public_base_url: public_base_url.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(VERIFICATION_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(verification_body(&self.public_base_url, token))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(email).await?;

        tracing::info!(to, "Verification email sent");
        Ok(())
    }
}

/// Development fallback: writes the verification link to the log.
pub struct LogMailer {
    public_base_url: String,
}

impl LogMailer {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailError> {
        tracing::warn!(
            to,
            link = %verification_link(&self.public_base_url, token),
            "MAIL_SERVER not set; verification email not sent"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::Arc;

use crate::avatar::AvatarStore;
use crate::config::ServerConfig;
use crate::mail::Mailer;
use crate::rate_limit::ClientRateLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: contacts_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Delivers verification emails.
    pub mailer: Arc<dyn Mailer>,
    /// Avatar image host; `None` when no credentials are configured.
    pub avatars: Option<Arc<dyn AvatarStore>>,
    /// Limits contact creation per client address.
    pub contact_limiter: Arc<ClientRateLimiter>,
}

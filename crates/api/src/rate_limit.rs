//! Per-client rate limiting for write-heavy endpoints.
//!
//! Backed by a `governor` keyed GCRA limiter: each client IP gets its own
//! bucket refilled at the configured rate. Idle buckets are pruned by
//! [`ClientRateLimiter::retain_recent`], which the server calls periodically.

use std::net::IpAddr;
use std::num::NonZeroU32;

use contacts_core::error::CoreError;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

/// Contact creations allowed per client per minute unless configured.
pub const DEFAULT_CONTACT_CREATE_PER_MINUTE: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);

pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    per_minute: NonZeroU32,
}

impl ClientRateLimiter {
    /// Allow `per_minute` requests per client, with the full allowance
    /// available as an initial burst.
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            per_minute,
        }
    }

    /// Consume one request for `client`.
    pub fn check(&self, client: IpAddr) -> Result<(), CoreError> {
        self.limiter.check_key(&client).map_err(|_| {
            tracing::debug!(%client, "Rate limit exceeded");
            CoreError::RateLimited(format!(
                "Rate limit exceeded: {} per 1 minute",
                self.per_minute
            ))
        })
    }

    /// Drop state for clients whose buckets have fully refilled.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

//! Request extractors.
//!
//! - [`auth::AuthUser`] -- The verified user behind a Bearer access token.
//! - [`client_ip::ClientIp`] -- The client address used for rate limiting.

pub mod auth;
pub mod client_ip;

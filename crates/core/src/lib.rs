//! Domain types and pure rules for the contacts service.
//!
//! Nothing in this crate performs I/O: database access lives in
//! `contacts-db` and HTTP concerns in `contacts-api`.

pub mod birthday;
pub mod database;
pub mod error;
pub mod search;
pub mod tokens;
pub mod types;
pub mod validation;

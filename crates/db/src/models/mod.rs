//! Row models and DTOs, one module per table.

pub mod contact;
pub mod user;

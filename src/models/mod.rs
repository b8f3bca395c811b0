//! Core data models for the document bin service.
//!
//! These entities map to the `users`, `bins` and `documents` tables via
//! `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod bin;
pub mod document;
pub mod user;

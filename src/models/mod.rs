//! Core data models for the image catalog service.
//!
//! These entities map to database rows via `sqlx::FromRow` and serialize as
//! JSON via `serde` using the external API's camelCase field names.

pub mod image;
pub mod upload;

//! Data models for the catalog asset service.
//!
//! Row types map to SQLite tables via `sqlx::FromRow` and serialize as JSON
//! via `serde`; the rest are transient values passed through the upload
//! pipeline.

pub mod asset;
pub mod catalog;
pub mod name_mapping;
pub mod object;
pub mod upload;

//! Commit-change dataset processing.
//!
//! Repairs malformed CSV exports of commit metadata, derives per-row and
//! per-commit features, and persists deduplicated GitHub Actions workflow-run
//! records for the mining pipeline.

pub mod enrich;
pub mod error;
pub mod features;
pub mod repair;
pub mod runstore;
pub mod schema;

pub use error::DatasetError;

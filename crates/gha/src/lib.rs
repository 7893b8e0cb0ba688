//! GitHub Actions REST consumer.
//!
//! Provides the paginated workflow-run collector and the remote build
//! labeler. All requests are sequential; the only scheduling concern is the
//! blocking rate-limit backoff in [`client::GhaClient`].

pub mod classify;
pub mod client;
pub mod collector;
pub mod error;
pub mod labeler;
pub mod models;

pub use client::GhaClient;
pub use error::GhaError;

//! Error types for GitHub API access.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the GitHub REST client.
#[derive(Debug, Error)]
pub enum GhaError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status returned by the API
    #[error("GitHub API error: {status} on {url}")]
    Status { status: StatusCode, url: String },

    /// Response body could not be parsed
    #[error("Failed to parse API response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A required credential was not supplied
    #[error("GitHub token is required for remote API access")]
    MissingToken,

    /// CSV read or write failed while merging labels
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem I/O failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Input CSV is missing a required column
    #[error("Input is missing required column '{column}'")]
    MissingColumn { column: String },
}

impl GhaError {
    /// Whether this error is a plain 404 (entity absent, not a failure).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }
        )
    }
}

//! Error types for mining.

use thiserror::Error;

/// Errors that abort a mining run.
#[derive(Debug, Error)]
pub enum MineError {
    /// Filesystem I/O failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A git subprocess failed
    #[error("git {operation} failed: {stderr}")]
    Git { operation: String, stderr: String },

    /// Output table could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The run store holds no success/failure conclusions
    #[error("No labeled SHAs found in the run store (need success/failure conclusions)")]
    NoLabels,

    /// No labeled commit was found in the repository history
    #[error("No rows mined; check that the labeled SHAs exist in this repository's history")]
    NoRows,
}

impl MineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn git(operation: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            stderr: stderr.into(),
        }
    }
}

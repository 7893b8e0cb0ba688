//! Error types for dataset processing.

use thiserror::Error;

/// Errors that can occur while repairing, enriching, or storing dataset
/// artifacts.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Filesystem I/O failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV read or write failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workflow-run store could not be serialized
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input file is missing a required column
    #[error("Input is missing required column '{column}'")]
    MissingColumn { column: String },
}

impl DatasetError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// src/error.rs
use thiserror::Error;

use crate::reader::ReadError;

/// Run-level failures: anything that stops a whole generation run.
///
/// Per-record render failures never appear here; they are folded into the
/// run summary as failure results so one bad record cannot sink a batch.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load table '{name}': {source}")]
    Table {
        name: String,
        #[source]
        source: ReadError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other pipeline error: {0}")]
    Other(String),
}

impl GenerateError {
    /// Attach a table name to a read failure.
    pub fn table(name: impl Into<String>, source: ReadError) -> Self {
        GenerateError::Table { name: name.into(), source }
    }
}

//! Error types for crowd-output.

use std::time::Duration;

use thiserror::Error;

/// Errors from serializing or delivering a frame.  A delivery error drops
/// the subscriber; it is never a simulation-level error.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("frame serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("subscriber queue is full")]
    Full,

    #[error("subscriber is closed")]
    Closed,

    #[error("delivery exceeded {0:?}")]
    Timeout(Duration),
}

/// Alias for `Result<T, OutputError>`.
pub type OutputResult<T> = Result<T, OutputError>;

//! Recorder error types.

use thiserror::Error;

/// Errors from exporting or saving a recording.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("failed to serialize recording: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write recording: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for recorder operations.
pub type Result<T> = std::result::Result<T, RecorderError>;

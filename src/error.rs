//! Error types for neurofocus

use thiserror::Error;

/// Errors that can occur while configuring or driving the focus engine
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Malformed sample chunk: {0}")]
    MalformedChunk(String),

    #[error("Acquisition source error: {0}")]
    Source(String),

    #[error("Score sink error: {0}")]
    Sink(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),
}

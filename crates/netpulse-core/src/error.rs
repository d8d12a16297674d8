//! Error types for netpulse-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid event payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Unknown slice key: {0}")]
    UnknownSlice(String),

    #[error("Invalid value for slice {slice}: {reason}")]
    InvalidSliceValue { slice: String, reason: String },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

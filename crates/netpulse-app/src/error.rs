//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stream error: {0}")]
    Stream(#[from] netpulse_stream::StreamError),

    #[error("Sync error: {0}")]
    Sync(#[from] netpulse_sync::SyncError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] netpulse_telemetry::TelemetryError),

    #[error("Unknown command: {0}")]
    Command(String),
}

pub type AppResult<T> = Result<T, AppError>;

//! Store and cache error types.

use netpulse_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown slice key: {0}")]
    UnknownSlice(String),

    #[error("Invalid slice value: {0}")]
    InvalidValue(CoreError),
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownSlice(key) => Self::UnknownSlice(key),
            other => Self::InvalidValue(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

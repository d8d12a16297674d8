//! netpulse live dashboard client.
//!
//! Keeps a local view of network health in sync with the backend:
//! - Push channel with reconnect backoff and heartbeat watchdog
//! - Deduplicated, debounced event dispatch into the state store
//! - Snapshot cache for instant startup renders
//! - Fallback polling while the push channel is down
//! - Frame-coalesced terminal rendering

pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod render;

pub use app::Application;
pub use command::Command;
pub use config::AppConfig;
pub use error::{AppError, AppResult};

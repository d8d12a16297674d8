//! Prometheus metrics and structured logging for netpulse.
//!
//! - Prometheus metrics for the push channel, event pipeline, fallback
//!   polling, rendering and the snapshot cache
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;

//! Push event pipeline for netpulse.
//!
//! Sits between the connection manager and the dashboard handlers:
//! - `DedupWindow`: bounded FIFO set of recently seen event ids
//! - `EventProcessor`: drops duplicates, buffers bursts and dispatches them
//!   after a quiet debounce window

pub mod dedup;
pub mod processor;

pub use dedup::{DedupWindow, DEFAULT_DEDUP_CAPACITY};
pub use processor::{IngestOutcome, ProcessorConfig, ProcessorStats, EventProcessor};

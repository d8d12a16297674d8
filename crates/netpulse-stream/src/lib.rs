//! Push-channel client for netpulse dashboard connections.
//!
//! Provides a resilient server-sent-events connection with:
//! - Automatic reconnection with capped exponential backoff (1s → 30s)
//! - Heartbeat watchdog (1.5x the server keep-alive period)
//! - Incremental SSE frame decoding and typed event parsing
//! - Deduplicated, debounced dispatch through `netpulse-feed`

pub mod backoff;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod sse;
pub mod transport;

pub use backoff::Backoff;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionStats};
pub use error::{StreamError, StreamResult};
pub use heartbeat::{HeartbeatStats, HeartbeatWatchdog};
pub use message::{parse_frame, StreamMessage};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{ByteStream, EventTransport, HttpEventTransport};

//! Heartbeat watchdog for the push channel.
//!
//! The server sends a keep-alive roughly every 30s. Every inbound frame
//! pushes the deadline out by the watchdog timeout (1.5x the server period
//! by default); if the deadline passes with no frame, the connection is
//! treated as failed.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Per-connection inactivity watchdog.
pub struct HeartbeatWatchdog {
    /// Allowed silence before the link is considered dead.
    timeout: Duration,
    /// When the watchdog fires unless rearmed.
    deadline: RwLock<Instant>,
    /// Wall-clock time of the last frame.
    last_frame: RwLock<Option<DateTime<Utc>>>,
    /// Frames seen since the last reset.
    frames: AtomicU64,
}

impl HeartbeatWatchdog {
    /// Create a watchdog armed from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: RwLock::new(Instant::now() + timeout),
            last_frame: RwLock::new(None),
            frames: AtomicU64::new(0),
        }
    }

    /// Timeout for a server keep-alive period and safety factor.
    pub fn timeout_for(server_interval: Duration, factor: f64) -> Duration {
        server_interval.mul_f64(factor.max(1.0))
    }

    /// Restart the watchdog (called when a connection opens).
    pub fn reset(&self) {
        *self.deadline.write() = Instant::now() + self.timeout;
        *self.last_frame.write() = None;
        self.frames.store(0, Ordering::Relaxed);
    }

    /// Record an inbound frame and push the deadline out.
    pub fn record_frame(&self) {
        *self.deadline.write() = Instant::now() + self.timeout;
        *self.last_frame.write() = Some(Utc::now());
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.read()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the deadline has passed.
    pub fn is_timed_out(&self) -> bool {
        Instant::now() >= self.deadline()
    }

    /// Resolve once the deadline passes without being pushed out.
    pub async fn expired(&self) {
        loop {
            let deadline = self.deadline();
            tokio::time::sleep_until(deadline).await;
            if self.deadline() <= Instant::now() {
                return;
            }
        }
    }

    pub fn stats(&self) -> HeartbeatStats {
        HeartbeatStats {
            last_frame: *self.last_frame.read(),
            frames: self.frames.load(Ordering::Relaxed),
            remaining_ms: self
                .deadline()
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
        }
    }
}

/// Heartbeat statistics.
#[derive(Debug, Clone)]
pub struct HeartbeatStats {
    pub last_frame: Option<DateTime<Utc>>,
    pub frames: u64,
    pub remaining_ms: u64,
}

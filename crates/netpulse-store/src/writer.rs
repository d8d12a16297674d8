//! Snapshot persistence for the state store.
//!
//! Write-through by default: every mutation is saved before subscribers
//! are notified. With a write-behind window, mutations made inside a tokio
//! runtime only record the latest state; one deferred write per window
//! saves it on the blocking pool. Writes are serialized and a snapshot is
//! never overwritten by an older one.

use crate::cache::SnapshotCache;
use crate::state::DashboardState;
use chrono::Utc;
use netpulse_telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{trace, warn};

struct Inner {
    cache: SnapshotCache,
    next_seq: AtomicU64,
    pending: Mutex<Option<(u64, DashboardState)>>,
    /// Sequence number of the last snapshot written.
    written: Mutex<u64>,
}

impl Inner {
    fn write(&self, seq: u64, state: &DashboardState) {
        let mut written = self.written.lock();
        if seq <= *written {
            trace!(seq, written = *written, "Skipping superseded snapshot");
            return;
        }
        if let Err(e) = self.cache.save(state, Utc::now()) {
            Metrics::cache_write_failed();
            warn!(error = %e, "Failed to write dashboard snapshot");
        }
        *written = seq;
    }

    fn write_pending(&self) {
        let pending = self.pending.lock().take();
        if let Some((seq, state)) = pending {
            self.write(seq, &state);
        }
    }
}

/// Saves store snapshots through a `SnapshotCache`.
pub struct SnapshotWriter {
    inner: Arc<Inner>,
    write_behind: Option<Duration>,
}

impl SnapshotWriter {
    pub fn new(cache: SnapshotCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                next_seq: AtomicU64::new(0),
                pending: Mutex::new(None),
                written: Mutex::new(0),
            }),
            write_behind: None,
        }
    }

    /// Coalesce writes made within `window` of each other into one.
    pub fn with_write_behind(mut self, window: Duration) -> Self {
        self.write_behind = Some(window);
        self
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.inner.cache
    }

    pub fn write_behind(&self) -> Option<Duration> {
        self.write_behind
    }

    /// Persist `state` now, or schedule it when write-behind is active.
    pub fn record(&self, state: &DashboardState) {
        let seq = self.next_seq();
        let (window, handle) = match (self.write_behind, Handle::try_current()) {
            (Some(window), Ok(handle)) => (window, handle),
            _ => {
                self.inner.write(seq, state);
                return;
            }
        };

        let armed = self
            .inner
            .pending
            .lock()
            .replace((seq, state.clone()))
            .is_some();
        if armed {
            return;
        }

        let inner = self.inner.clone();
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(e) = tokio::task::spawn_blocking(move || inner.write_pending()).await {
                warn!(error = %e, "Snapshot write task failed");
            }
        });
    }

    /// Write `state` synchronously, superseding any scheduled write.
    pub fn flush(&self, state: &DashboardState) {
        let seq = self.next_seq();
        self.inner.pending.lock().take();
        self.inner.write(seq, state);
    }

    /// Whether a deferred write is waiting.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("cache", &self.inner.cache)
            .field("write_behind", &self.write_behind)
            .field("pending", &self.is_pending())
            .finish()
    }
}

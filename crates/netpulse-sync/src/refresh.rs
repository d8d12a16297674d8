//! Full-refresh fetching into the state store.
//!
//! Each slice is fetched independently under its own timeout. A failed or
//! timed-out slice keeps its previous value; the others are written as soon
//! as they arrive.

use crate::client::{SliceSource, DEFAULT_FETCH_TIMEOUT};
use crate::error::{SyncError, SyncResult};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use netpulse_core::{SliceKey, SliceUpdate, TimeRange};
use netpulse_store::StateStore;
use netpulse_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a refresh was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshReason {
    Initial,
    Manual,
    Poll,
    Visibility,
}

impl RefreshReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Manual => "manual",
            Self::Poll => "poll",
            Self::Visibility => "visibility",
        }
    }
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can run a full refresh.
pub trait RefreshTrigger: Send + Sync + 'static {
    fn refresh(&self, reason: RefreshReason) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Per-slice fetch timeout.
    pub fetch_timeout: Duration,
    /// Range used for `trends` until changed.
    pub time_range: TimeRange,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            time_range: TimeRange::default(),
        }
    }
}

/// Outcome of one `refresh_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub updated: Vec<SliceKey>,
    pub failed: Vec<(SliceKey, String)>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Banner text naming the failed slices.
    pub fn error_message(&self) -> Option<String> {
        let slices: Vec<SliceKey> = self.failed.iter().map(|(slice, _)| *slice).collect();
        failure_message(&slices)
    }
}

fn failure_message(slices: &[SliceKey]) -> Option<String> {
    if slices.is_empty() {
        return None;
    }
    let names: Vec<&str> = slices.iter().map(|slice| slice.as_str()).collect();
    Some(format!("Failed to load {}", names.join(", ")))
}

/// Refreshes currently running and the slices they failed to load.
#[derive(Debug, Default)]
struct InFlight {
    count: usize,
    failed: Vec<SliceKey>,
}

/// Holds one `InFlight` slot for the lifetime of a refresh, including one
/// dropped before completion. The last refresh out publishes `isLoading`
/// and the combined error.
struct InFlightGuard<'a> {
    refresher: &'a Refresher,
    report: RefreshReport,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.refresher.in_flight.lock();
        let updated = &self.report.updated;
        in_flight.failed.retain(|slice| !updated.contains(slice));
        for (slice, _) in &self.report.failed {
            if !in_flight.failed.contains(slice) {
                in_flight.failed.push(*slice);
            }
        }
        in_flight.count = in_flight.count.saturating_sub(1);

        if in_flight.count == 0 {
            let failed = std::mem::take(&mut in_flight.failed);
            self.refresher.store.apply_all([
                SliceUpdate::Error(failure_message(&failed)),
                SliceUpdate::IsLoading(false),
            ]);
        }
    }
}

/// Fetches slices from a `SliceSource` and writes them to the store.
pub struct Refresher {
    source: Arc<dyn SliceSource>,
    store: Arc<StateStore>,
    fetch_timeout: Duration,
    time_range: RwLock<TimeRange>,
    in_flight: Mutex<InFlight>,
}

impl Refresher {
    pub fn new(source: Arc<dyn SliceSource>, store: Arc<StateStore>, config: RefreshConfig) -> Self {
        Self {
            source,
            store,
            fetch_timeout: config.fetch_timeout,
            time_range: RwLock::new(config.time_range),
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn time_range(&self) -> TimeRange {
        *self.time_range.read()
    }

    /// Number of refreshes currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().count
    }

    /// Fetch every slice concurrently.
    ///
    /// `isLoading` stays set while any refresh is running. When the last
    /// overlapping refresh ends, `error` names the slices still failing, or
    /// is cleared when none are.
    pub async fn refresh_all(&self, reason: RefreshReason) -> RefreshReport {
        Metrics::refresh_started(reason.as_str());
        debug!(reason = %reason, "Full refresh started");
        let mut guard = self.begin();

        let range = self.time_range();
        let mut pending: FuturesUnordered<_> = SliceKey::FETCHABLE
            .into_iter()
            .map(|slice| async move { (slice, self.fetch(slice, range).await) })
            .collect();

        while let Some((slice, result)) = pending.next().await {
            match result {
                Ok(value) => {
                    self.store.apply(SliceUpdate::Data(slice, value));
                    guard.report.updated.push(slice);
                }
                Err(e) => {
                    Metrics::refresh_failed(slice.as_str());
                    warn!(slice = %slice, error = %e, "Slice refresh failed");
                    guard.report.failed.push((slice, e.to_string()));
                }
            }
        }

        let report = guard.report.clone();
        drop(guard);

        info!(
            reason = %reason,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Full refresh finished"
        );
        report
    }

    /// Fetch and write a single slice.
    pub async fn refresh_slice(&self, slice: SliceKey) -> SyncResult<()> {
        let value = self.fetch(slice, self.time_range()).await?;
        self.store.apply(SliceUpdate::Data(slice, value));
        Ok(())
    }

    /// Switch the trends range and refetch `trends` only.
    pub async fn set_time_range(&self, range: TimeRange) -> SyncResult<()> {
        *self.time_range.write() = range;
        info!(range = %range, "Trends range changed");

        self.refresh_slice(SliceKey::Trends).await.map_err(|e| {
            Metrics::refresh_failed(SliceKey::Trends.as_str());
            warn!(error = %e, "Trends refresh failed");
            e
        })
    }

    fn begin(&self) -> InFlightGuard<'_> {
        let mut in_flight = self.in_flight.lock();
        in_flight.count += 1;
        if in_flight.count == 1 {
            self.store.apply(SliceUpdate::IsLoading(true));
        }
        InFlightGuard {
            refresher: self,
            report: RefreshReport::default(),
        }
    }

    async fn fetch(&self, slice: SliceKey, range: TimeRange) -> SyncResult<Value> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch(slice, range))
            .await
            .map_err(|_| SyncError::Timeout(self.fetch_timeout))?
    }
}

impl RefreshTrigger for Refresher {
    fn refresh(&self, reason: RefreshReason) -> BoxFuture<'_, ()> {
        async move {
            self.refresh_all(reason).await;
        }
        .boxed()
    }
}

impl fmt::Debug for Refresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresher")
            .field("fetch_timeout", &self.fetch_timeout)
            .field("time_range", &self.time_range())
            .finish()
    }
}

//! Prometheus metrics for netpulse.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on duplicate
//! metric names, which is a programming error caught on first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_int_counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, IntCounter,
    TextEncoder,
};

/// Push channel state (1 = connected, 0 = otherwise).
pub static STREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "netpulse_stream_connected",
        "Push channel connection state (1=connected)"
    )
    .unwrap()
});

/// Push channel state machine current state.
/// Labels: state (connecting/connected/disconnected)
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "netpulse_stream_state",
        "Push channel state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Reconnects scheduled, by reason.
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "netpulse_stream_reconnect_total",
        "Total push channel reconnects scheduled",
        &["reason"]
    )
    .unwrap()
});

/// Events received from the push channel, by type.
pub static EVENTS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "netpulse_events_received_total",
        "Total push events received",
        &["event_type"]
    )
    .unwrap()
});

/// Events dropped by the dedup window.
pub static EVENTS_DUPLICATE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "netpulse_events_duplicate_total",
        "Total push events dropped as duplicates"
    )
    .unwrap()
});

/// Frames dropped because their payload did not parse.
pub static EVENTS_MALFORMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "netpulse_events_malformed_total",
        "Total push frames dropped as malformed"
    )
    .unwrap()
});

/// Events per debounce flush.
pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "netpulse_batch_size",
        "Events dispatched per debounce flush",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0]
    )
    .unwrap()
});

/// Fallback polling loop active (1) or not (0).
pub static FALLBACK_POLLING: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "netpulse_fallback_polling",
        "Fallback polling loop active (1=polling)"
    )
    .unwrap()
});

/// Full refreshes started, by trigger.
pub static REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "netpulse_refresh_total",
        "Total full refreshes started",
        &["trigger"]
    )
    .unwrap()
});

/// Slice fetch failures, by slice.
pub static REFRESH_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "netpulse_refresh_failures_total",
        "Total slice fetch failures or timeouts",
        &["slice"]
    )
    .unwrap()
});

/// Render passes executed.
pub static RENDERS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("netpulse_renders_total", "Total render passes").unwrap()
});

/// Snapshot cache write failures.
pub static CACHE_WRITE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "netpulse_cache_write_failures_total",
        "Total snapshot cache write failures"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Set push channel state. Only the active state is set to 1.
    pub fn stream_state_set(state: &str) {
        for s in ["connecting", "connected", "disconnected"] {
            STREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1.0);
        STREAM_CONNECTED.set(if state == "connected" { 1.0 } else { 0.0 });
    }

    /// Record a scheduled reconnect.
    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn event_received(event_type: &str) {
        EVENTS_RECEIVED_TOTAL.with_label_values(&[event_type]).inc();
    }

    pub fn event_duplicate() {
        EVENTS_DUPLICATE_TOTAL.inc();
    }

    pub fn event_malformed() {
        EVENTS_MALFORMED_TOTAL.inc();
    }

    pub fn batch_flushed(size: usize) {
        BATCH_SIZE.observe(size as f64);
    }

    pub fn fallback_polling(active: bool) {
        FALLBACK_POLLING.set(if active { 1.0 } else { 0.0 });
    }

    pub fn refresh_started(trigger: &str) {
        REFRESH_TOTAL.with_label_values(&[trigger]).inc();
    }

    pub fn refresh_failed(slice: &str) {
        REFRESH_FAILURES_TOTAL.with_label_values(&[slice]).inc();
    }

    pub fn render() {
        RENDERS_TOTAL.inc();
    }

    pub fn cache_write_failed() {
        CACHE_WRITE_FAILURES_TOTAL.inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

//! Debounced event batching.
//!
//! Every accepted event is appended to a buffer and re-arms a short
//! debounce timer. When the timer fires with no newer event, the whole
//! buffer is flushed: each event is dispatched exactly once, in arrival
//! order across all kinds. Batching lowers dispatch frequency under event
//! storms without merging or dropping payloads.

use crate::dedup::{DedupWindow, DEFAULT_DEDUP_CAPACITY};
use netpulse_core::{dispatch, DashboardHandlers, EventKind, InboundEvent, TimerSlot};
use netpulse_telemetry::Metrics;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Event processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Quiet period before a buffered batch is dispatched.
    pub debounce: Duration,
    /// Number of event ids remembered for deduplication.
    pub dedup_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

/// Result of handing an event to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event id already seen; dropped.
    Duplicate,
    /// Event queued for the next flush.
    Buffered,
}

/// Processor counters.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    pub accepted: AtomicU64,
    pub duplicates: AtomicU64,
    pub dispatched: AtomicU64,
    pub flushes: AtomicU64,
}

impl ProcessorStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Deduplicating, debouncing front end for the dashboard handlers.
pub struct EventProcessor {
    config: ProcessorConfig,
    handlers: Arc<dyn DashboardHandlers>,
    dedup: Mutex<DedupWindow>,
    buffer: Mutex<Vec<InboundEvent>>,
    debounce: TimerSlot,
    stats: ProcessorStats,
    weak_self: Weak<EventProcessor>,
}

impl EventProcessor {
    pub fn new(config: ProcessorConfig, handlers: Arc<dyn DashboardHandlers>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            dedup: Mutex::new(DedupWindow::new(config.dedup_capacity)),
            config,
            handlers,
            buffer: Mutex::new(Vec::new()),
            debounce: TimerSlot::new("debounce"),
            stats: ProcessorStats::default(),
            weak_self: weak_self.clone(),
        })
    }

    /// Accept an inbound event.
    ///
    /// Events carrying an id already in the dedup window are dropped.
    /// Must be called from within a tokio runtime.
    pub fn ingest(&self, event: InboundEvent) -> IngestOutcome {
        if let Some(id) = event.event_id.as_deref() {
            if !self.dedup.lock().check_and_insert(id) {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                Metrics::event_duplicate();
                trace!(event_id = %id, kind = %event.kind, "Duplicate event dropped");
                return IngestOutcome::Duplicate;
            }
        }

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        self.buffer.lock().push(event);

        let weak = self.weak_self.clone();
        self.debounce.arm(self.config.debounce, move || {
            if let Some(processor) = weak.upgrade() {
                processor.flush();
            }
        });

        IngestOutcome::Buffered
    }

    /// Dispatch everything buffered right now. Returns the number of events.
    pub fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return 0;
        }

        let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
        for event in &batch {
            *per_kind.entry(event.kind.wire_name()).or_default() += 1;
        }
        debug!(size = batch.len(), ?per_kind, "Flushing event batch");

        for event in &batch {
            dispatch(self.handlers.as_ref(), event);
        }

        self.stats
            .dispatched
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        Metrics::batch_flushed(batch.len());
        batch.len()
    }

    /// Drop pending events, cancel the debounce timer and forget seen ids.
    pub fn clear(&self) {
        self.debounce.cancel();
        let dropped = std::mem::take(&mut *self.buffer.lock()).len();
        self.dedup.lock().clear();
        if dropped > 0 {
            debug!(dropped, "Pending events discarded");
        }
    }

    /// Events waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Pending events of one kind.
    pub fn pending_of(&self, kind: EventKind) -> usize {
        self.buffer.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn handlers(&self) -> &Arc<dyn DashboardHandlers> {
        &self.handlers
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .field("dedup_len", &self.dedup.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_core::{
        AlertCreated, ClassificationUpdate, ConnectionStatus, DeviceStatusChange, DeviceUpdate,
        InterfaceThreshold, LatencySpike,
    };
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(EventKind, Option<String>)>>,
    }

    impl Recorder {
        fn push(&self, event: &InboundEvent) {
            self.seen.lock().push((event.kind, event.event_id.clone()));
        }

        fn ids(&self) -> Vec<Option<String>> {
            self.seen.lock().iter().map(|(_, id)| id.clone()).collect()
        }
    }

    impl DashboardHandlers for Recorder {
        fn on_device_status(&self, e: &InboundEvent, _: &DeviceStatusChange) {
            self.push(e)
        }
        fn on_alert_created(&self, e: &InboundEvent, _: &AlertCreated) {
            self.push(e)
        }
        fn on_latency_spike(&self, e: &InboundEvent, _: &LatencySpike) {
            self.push(e)
        }
        fn on_interface_threshold(&self, e: &InboundEvent, _: &InterfaceThreshold) {
            self.push(e)
        }
        fn on_classification_update(&self, e: &InboundEvent, _: &ClassificationUpdate) {
            self.push(e)
        }
        fn on_device_update(&self, e: &InboundEvent, _: &DeviceUpdate) {
            self.push(e)
        }
        fn on_connection_change(&self, _: ConnectionStatus) {}
    }

    fn event(kind: EventKind, id: Option<&str>) -> InboundEvent {
        InboundEvent::from_raw(kind, id.map(str::to_string), json!({})).unwrap()
    }

    fn processor() -> (Arc<EventProcessor>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let processor = EventProcessor::new(ProcessorConfig::default(), recorder.clone());
        (processor, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ids_dispatched_once() {
        let (processor, recorder) = processor();

        assert_eq!(
            processor.ingest(event(EventKind::AlertCreated, Some("a"))),
            IngestOutcome::Buffered
        );
        assert_eq!(
            processor.ingest(event(EventKind::AlertCreated, Some("a"))),
            IngestOutcome::Duplicate
        );
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Resent after the flush: still a duplicate
        processor.ingest(event(EventKind::AlertCreated, Some("a")));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(recorder.ids(), vec![Some("a".to_string())]);
        assert_eq!(processor.stats().duplicates(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_without_id_always_processed() {
        let (processor, recorder) = processor();
        processor.ingest(event(EventKind::LatencySpike, None));
        processor.ingest(event(EventKind::LatencySpike, None));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_waits_for_quiet_period() {
        let (processor, recorder) = processor();

        for i in 0..5 {
            processor.ingest(event(EventKind::DeviceStatus, Some(&format!("d{i}"))));
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        // Each ingest re-armed the timer, nothing dispatched yet
        assert!(recorder.seen.lock().is_empty());
        assert_eq!(processor.pending(), 5);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(recorder.seen.lock().len(), 5);
        assert_eq!(processor.stats().flushes(), 1);
        assert_eq!(processor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_preserves_global_arrival_order() {
        let (processor, recorder) = processor();
        processor.ingest(event(EventKind::AlertCreated, Some("1")));
        processor.ingest(event(EventKind::DeviceStatus, Some("2")));
        processor.ingest(event(EventKind::AlertCreated, Some("3")));
        processor.ingest(event(EventKind::LatencySpike, Some("4")));

        assert_eq!(processor.pending_of(EventKind::AlertCreated), 2);
        assert_eq!(processor.flush(), 4);

        let ids: Vec<String> = recorder.ids().into_iter().flatten().collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_pending_and_forgets_ids() {
        let (processor, recorder) = processor();
        processor.ingest(event(EventKind::AlertCreated, Some("x")));
        processor.clear();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(recorder.seen.lock().is_empty());

        assert_eq!(
            processor.ingest(event(EventKind::AlertCreated, Some("x"))),
            IngestOutcome::Buffered
        );
    }
}

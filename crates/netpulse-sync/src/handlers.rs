//! Push-event handlers that write into the state store.

use crate::fallback::FallbackCoordinator;
use netpulse_core::{
    AlertCreated, ClassificationUpdate, ConnectionStatus, DashboardHandlers, DeviceStatusChange,
    DeviceUpdate, InboundEvent, InterfaceThreshold, LatencySpike, SliceUpdate,
};
use netpulse_store::StateStore;
use std::sync::Arc;
use tracing::debug;

/// Routes dispatched events to `StateStore::merge_realtime_update` and
/// connection transitions to the store and the fallback coordinator.
pub struct StoreHandlers {
    store: Arc<StateStore>,
    fallback: Option<FallbackCoordinator>,
}

impl StoreHandlers {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackCoordinator) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl DashboardHandlers for StoreHandlers {
    fn on_device_status(&self, event: &InboundEvent, change: &DeviceStatusChange) {
        debug!(device = ?change.device_ip, new_state = ?change.new_state, "Device status changed");
        self.store.merge_realtime_update(event);
    }

    fn on_alert_created(&self, event: &InboundEvent, alert: &AlertCreated) {
        debug!(device = ?alert.device_label(), severity = ?alert.severity, "Alert created");
        self.store.merge_realtime_update(event);
    }

    fn on_latency_spike(&self, event: &InboundEvent, spike: &LatencySpike) {
        debug!(device = ?spike.device_ip, latency_ms = ?spike.latency_ms, "Latency spike");
        self.store.merge_realtime_update(event);
    }

    fn on_interface_threshold(&self, event: &InboundEvent, threshold: &InterfaceThreshold) {
        debug!(
            device = ?threshold.device_ip,
            interface = ?threshold.interface,
            "Interface threshold crossed"
        );
        self.store.merge_realtime_update(event);
    }

    fn on_classification_update(&self, event: &InboundEvent, update: &ClassificationUpdate) {
        debug!(device = ?update.ip_address, "Classification updated");
        self.store.merge_realtime_update(event);
    }

    fn on_device_update(&self, event: &InboundEvent, update: &DeviceUpdate) {
        debug!(device = ?update.ip, status = ?update.status, "Device updated");
        self.store.merge_realtime_update(event);
    }

    fn on_connection_change(&self, status: ConnectionStatus) {
        self.store.apply(SliceUpdate::ConnectionStatus(status));
        if let Some(fallback) = &self.fallback {
            fallback.on_connection_change(status);
        }
    }
}

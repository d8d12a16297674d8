//! Exhaustive handler table for push events.

use crate::event::{EventPayload, InboundEvent};
use crate::status::ConnectionStatus;
use crate::{
    AlertCreated, ClassificationUpdate, DeviceStatusChange, DeviceUpdate, InterfaceThreshold,
    LatencySpike,
};

/// Receiver for dispatched push events and connection transitions.
///
/// Every event kind has a required method, so adding a kind is a compile
/// error until each implementation handles it.
pub trait DashboardHandlers: Send + Sync + 'static {
    fn on_device_status(&self, event: &InboundEvent, change: &DeviceStatusChange);

    fn on_alert_created(&self, event: &InboundEvent, alert: &AlertCreated);

    fn on_latency_spike(&self, event: &InboundEvent, spike: &LatencySpike);

    fn on_interface_threshold(&self, event: &InboundEvent, threshold: &InterfaceThreshold);

    fn on_classification_update(&self, event: &InboundEvent, update: &ClassificationUpdate);

    fn on_device_update(&self, event: &InboundEvent, update: &DeviceUpdate);

    fn on_connection_change(&self, status: ConnectionStatus);
}

/// Route one event to its typed handler.
pub fn dispatch(handlers: &dyn DashboardHandlers, event: &InboundEvent) {
    match &event.payload {
        EventPayload::DeviceStatus(p) => handlers.on_device_status(event, p),
        EventPayload::AlertCreated(p) => handlers.on_alert_created(event, p),
        EventPayload::LatencySpike(p) => handlers.on_latency_spike(event, p),
        EventPayload::InterfaceThreshold(p) => handlers.on_interface_threshold(event, p),
        EventPayload::ClassificationUpdate(p) => handlers.on_classification_update(event, p),
        EventPayload::DeviceUpdate(p) => handlers.on_device_update(event, p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl DashboardHandlers for Recorder {
        fn on_device_status(&self, _: &InboundEvent, _: &DeviceStatusChange) {
            self.calls.lock().push("device_status");
        }
        fn on_alert_created(&self, _: &InboundEvent, _: &AlertCreated) {
            self.calls.lock().push("alert_created");
        }
        fn on_latency_spike(&self, _: &InboundEvent, _: &LatencySpike) {
            self.calls.lock().push("latency_spike");
        }
        fn on_interface_threshold(&self, _: &InboundEvent, _: &InterfaceThreshold) {
            self.calls.lock().push("interface_threshold");
        }
        fn on_classification_update(&self, _: &InboundEvent, _: &ClassificationUpdate) {
            self.calls.lock().push("classification_update");
        }
        fn on_device_update(&self, _: &InboundEvent, _: &DeviceUpdate) {
            self.calls.lock().push("device_update");
        }
        fn on_connection_change(&self, _: ConnectionStatus) {
            self.calls.lock().push("connection");
        }
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let recorder = Recorder::default();
        for kind in EventKind::ALL {
            let event = InboundEvent::from_raw(kind, None, json!({})).unwrap();
            dispatch(&recorder, &event);
        }
        let calls = recorder.calls.lock().clone();
        let expected: Vec<&str> = EventKind::ALL.iter().map(|k| k.wire_name()).collect();
        assert_eq!(calls, expected);
    }
}

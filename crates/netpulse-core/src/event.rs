//! Typed push events.
//!
//! The backend broadcasts named SSE events whose `data` is a JSON envelope
//! `{event_id, event_type, timestamp, payload}`. Each event name maps to one
//! `EventKind` and one typed payload variant, so handler tables are checked
//! at compile time instead of by string lookup.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DeviceStatus,
    AlertCreated,
    LatencySpike,
    InterfaceThreshold,
    ClassificationUpdate,
    DeviceUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::DeviceStatus,
        EventKind::AlertCreated,
        EventKind::LatencySpike,
        EventKind::InterfaceThreshold,
        EventKind::ClassificationUpdate,
        EventKind::DeviceUpdate,
    ];

    /// Event name as broadcast by the server.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::DeviceStatus => "device_status",
            Self::AlertCreated => "alert_created",
            Self::LatencySpike => "latency_spike",
            Self::InterfaceThreshold => "interface_threshold",
            Self::ClassificationUpdate => "classification_update",
            Self::DeviceUpdate => "device_update",
        }
    }

    /// Resolve an SSE event name.
    ///
    /// Accepts the server's snake_case names as well as hyphenated spellings
    /// (`alert-created`, `device-status-changed`).
    pub fn from_wire(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "device_status" | "device_status_changed" => Some(Self::DeviceStatus),
            "alert_created" => Some(Self::AlertCreated),
            "latency_spike" => Some(Self::LatencySpike),
            "interface_threshold" => Some(Self::InterfaceThreshold),
            "classification_update" => Some(Self::ClassificationUpdate),
            "device_update" => Some(Self::DeviceUpdate),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Direction of a device state change as far as the summary counters care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTransition {
    Up,
    Down,
}

fn transition_from(value: &str) -> Option<DeviceTransition> {
    match value.trim().to_ascii_lowercase().as_str() {
        "critical" | "down" | "offline" => Some(DeviceTransition::Down),
        "ok" | "up" | "online" => Some(DeviceTransition::Up),
        _ => None,
    }
}

/// Device went up or down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceStatusChange {
    pub device_ip: Option<String>,
    pub device_name: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    /// Threshold-engine severity (`OK`/`WARNING`/`CRITICAL`).
    pub new_state: Option<String>,
}

impl DeviceStatusChange {
    /// `new_state` wins over the legacy `new_status` field.
    pub fn transition(&self) -> Option<DeviceTransition> {
        self.new_state
            .as_deref()
            .and_then(transition_from)
            .or_else(|| self.new_status.as_deref().and_then(transition_from))
    }
}

/// New alert raised by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertCreated {
    pub device_ip: Option<String>,
    pub device_name: Option<String>,
    pub message: Option<String>,
    pub severity: Option<String>,
}

impl AlertCreated {
    /// Counter bucket for this alert; unrecognized severities count as info.
    pub fn severity_bucket(&self) -> &'static str {
        match self
            .severity
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("critical") => "critical",
            Some("warning") => "warning",
            _ => "info",
        }
    }

    /// Display name of the affected device.
    pub fn device_label(&self) -> Option<&str> {
        self.device_name.as_deref().or(self.device_ip.as_deref())
    }
}

/// Latency sample that crossed the spike threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySpike {
    pub device_ip: Option<String>,
    #[serde(alias = "latency")]
    pub latency_ms: Option<f64>,
    #[serde(alias = "threshold")]
    pub threshold_ms: Option<f64>,
}

/// Interface utilization crossed a configured limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceThreshold {
    pub device_ip: Option<String>,
    #[serde(alias = "interface_name")]
    pub interface: Option<String>,
    pub utilization_pct: Option<f64>,
    pub threshold_pct: Option<f64>,
}

/// Device classifier produced a new result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationUpdate {
    pub ip_address: Option<String>,
    pub classification: Option<Value>,
    pub device: Option<Value>,
}

/// Monitor scan result for a single device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceUpdate {
    pub device_id: Option<Value>,
    pub ip: Option<String>,
    pub status: Option<String>,
    pub latency: Option<f64>,
    pub packet_loss: Option<f64>,
}

impl DeviceUpdate {
    pub fn transition(&self) -> Option<DeviceTransition> {
        self.status.as_deref().and_then(transition_from)
    }
}

/// Typed event payload, one variant per `EventKind`.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    DeviceStatus(DeviceStatusChange),
    AlertCreated(AlertCreated),
    LatencySpike(LatencySpike),
    InterfaceThreshold(InterfaceThreshold),
    ClassificationUpdate(ClassificationUpdate),
    DeviceUpdate(DeviceUpdate),
}

impl EventPayload {
    /// Decode a raw payload for the given kind.
    pub fn decode(kind: EventKind, raw: &Value) -> Result<Self> {
        let value = match raw {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => raw.clone(),
            other => {
                return Err(CoreError::InvalidPayload {
                    kind: kind.to_string(),
                    reason: format!("expected object, got {other}"),
                })
            }
        };

        let invalid = |e: serde_json::Error| CoreError::InvalidPayload {
            kind: kind.to_string(),
            reason: e.to_string(),
        };

        Ok(match kind {
            EventKind::DeviceStatus => {
                Self::DeviceStatus(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::AlertCreated => {
                Self::AlertCreated(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::LatencySpike => {
                Self::LatencySpike(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::InterfaceThreshold => {
                Self::InterfaceThreshold(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::ClassificationUpdate => {
                Self::ClassificationUpdate(serde_json::from_value(value).map_err(invalid)?)
            }
            EventKind::DeviceUpdate => {
                Self::DeviceUpdate(serde_json::from_value(value).map_err(invalid)?)
            }
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::DeviceStatus(_) => EventKind::DeviceStatus,
            Self::AlertCreated(_) => EventKind::AlertCreated,
            Self::LatencySpike(_) => EventKind::LatencySpike,
            Self::InterfaceThreshold(_) => EventKind::InterfaceThreshold,
            Self::ClassificationUpdate(_) => EventKind::ClassificationUpdate,
            Self::DeviceUpdate(_) => EventKind::DeviceUpdate,
        }
    }
}

/// Server envelope carried in the SSE `data` field.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

/// A push event after parsing, ready for deduplication and dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub kind: EventKind,
    /// Deduplication key. `None` means the event is always processed.
    pub event_id: Option<String>,
    pub payload: EventPayload,
    /// Payload as received, kept for the realtime event log.
    pub raw_payload: Value,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Build an event directly from a typed payload.
    pub fn new(event_id: Option<String>, payload: EventPayload, raw_payload: Value) -> Self {
        Self {
            kind: payload.kind(),
            event_id,
            payload,
            raw_payload,
            received_at: Utc::now(),
        }
    }

    /// Build an event from a kind and raw JSON payload.
    pub fn from_raw(kind: EventKind, event_id: Option<String>, raw_payload: Value) -> Result<Self> {
        let payload = EventPayload::decode(kind, &raw_payload)?;
        Ok(Self {
            kind,
            event_id,
            payload,
            raw_payload,
            received_at: Utc::now(),
        })
    }

    /// Parse the `data` field of an SSE frame.
    ///
    /// The frame-level `id` takes precedence over `event_id` in the envelope.
    /// When the body has no `payload` member the whole body is the payload.
    pub fn parse(kind: EventKind, frame_id: Option<&str>, data: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(data)?;
        let envelope: Envelope = match &body {
            Value::Object(_) => serde_json::from_value(body.clone())?,
            _ => Envelope {
                event_id: None,
                payload: None,
            },
        };

        let event_id = frame_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or(envelope.event_id);
        let raw_payload = envelope.payload.unwrap_or(body);

        Self::from_raw(kind, event_id, raw_payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_aliases() {
        assert_eq!(
            EventKind::from_wire("device_status"),
            Some(EventKind::DeviceStatus)
        );
        assert_eq!(
            EventKind::from_wire("device-status-changed"),
            Some(EventKind::DeviceStatus)
        );
        assert_eq!(
            EventKind::from_wire("Alert-Created"),
            Some(EventKind::AlertCreated)
        );
        assert_eq!(EventKind::from_wire("connected"), None);
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire(kind.wire_name()), Some(kind));
        }
    }

    #[test]
    fn test_device_transition() {
        let change = DeviceStatusChange {
            new_state: Some("CRITICAL".to_string()),
            ..Default::default()
        };
        assert_eq!(change.transition(), Some(DeviceTransition::Down));

        let change = DeviceStatusChange {
            new_status: Some("up".to_string()),
            ..Default::default()
        };
        assert_eq!(change.transition(), Some(DeviceTransition::Up));

        let change = DeviceStatusChange {
            new_state: Some("WARNING".to_string()),
            ..Default::default()
        };
        assert_eq!(change.transition(), None);
    }

    #[test]
    fn test_severity_bucket_case_insensitive() {
        let alert = |s: &str| AlertCreated {
            severity: Some(s.to_string()),
            ..Default::default()
        };
        assert_eq!(alert("Critical").severity_bucket(), "critical");
        assert_eq!(alert("WARNING").severity_bucket(), "warning");
        assert_eq!(alert("info").severity_bucket(), "info");
        assert_eq!(alert("emergency").severity_bucket(), "info");
        assert_eq!(AlertCreated::default().severity_bucket(), "info");
    }

    #[test]
    fn test_parse_envelope() {
        let data = r#"{
            "event_id": "body-id",
            "event_type": "latency_spike",
            "timestamp": "2024-01-01T00:00:00Z",
            "payload": {"device_ip": "10.0.0.1", "latency": 250.5}
        }"#;

        let event = InboundEvent::parse(EventKind::LatencySpike, Some("frame-id"), data).unwrap();
        assert_eq!(event.event_id.as_deref(), Some("frame-id"));
        match event.payload {
            EventPayload::LatencySpike(spike) => {
                assert_eq!(spike.latency_ms, Some(250.5));
                assert_eq!(spike.device_ip.as_deref(), Some("10.0.0.1"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(event.raw_payload["latency"], json!(250.5));
    }

    #[test]
    fn test_parse_envelope_id_fallback_and_bare_body() {
        let event = InboundEvent::parse(
            EventKind::AlertCreated,
            None,
            r#"{"event_id": "abc", "payload": {"severity": "warning"}}"#,
        )
        .unwrap();
        assert_eq!(event.event_id.as_deref(), Some("abc"));

        let event =
            InboundEvent::parse(EventKind::AlertCreated, None, r#"{"severity": "critical"}"#)
                .unwrap();
        assert_eq!(event.event_id, None);
        assert_eq!(
            event.payload,
            EventPayload::AlertCreated(AlertCreated {
                severity: Some("critical".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(InboundEvent::parse(EventKind::DeviceStatus, None, "{not json").is_err());
        assert!(InboundEvent::parse(
            EventKind::DeviceStatus,
            None,
            r#"{"payload": [1, 2, 3]}"#
        )
        .is_err());
    }
}

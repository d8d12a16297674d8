//! Dashboard state slices.

use chrono::{DateTime, Duration, Utc};
use netpulse_core::{ConnectionStatus, InboundEvent, SliceKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Realtime event log length.
pub const REALTIME_EVENT_CAPACITY: usize = 50;

/// Recent alerts kept in `topProblems.recent_alerts`.
pub const RECENT_ALERTS_CAPACITY: usize = 10;

/// One entry of the realtime event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEventRecord {
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl From<&InboundEvent> for RealtimeEventRecord {
    fn from(event: &InboundEvent) -> Self {
        Self {
            event_type: event.kind.wire_name().to_string(),
            event_id: event.event_id.clone(),
            payload: event.raw_payload.clone(),
            received_at: event.received_at,
        }
    }
}

/// Full dashboard state.
///
/// Data slices hold backend JSON as-is; `None` means never loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub summary: Option<Value>,
    pub trends: Option<Value>,
    pub top_problems: Option<Value>,
    pub inventory: Option<Value>,
    pub alerts: Option<Value>,
    pub realtime_interfaces: Option<Value>,
    #[serde(rename = "networkIOTrend")]
    pub network_io_trend: Option<Value>,
    pub connection_status: ConnectionStatus,
    pub last_event_id: Option<String>,
    /// Newest first, at most `REALTIME_EVENT_CAPACITY` entries.
    pub realtime_events: VecDeque<RealtimeEventRecord>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl DashboardState {
    pub fn slice(&self, key: SliceKey) -> Option<&Value> {
        match key {
            SliceKey::Summary => self.summary.as_ref(),
            SliceKey::Trends => self.trends.as_ref(),
            SliceKey::TopProblems => self.top_problems.as_ref(),
            SliceKey::Inventory => self.inventory.as_ref(),
            SliceKey::Alerts => self.alerts.as_ref(),
            SliceKey::RealtimeInterfaces => self.realtime_interfaces.as_ref(),
            SliceKey::NetworkIoTrend => self.network_io_trend.as_ref(),
        }
    }

    pub fn slice_mut(&mut self, key: SliceKey) -> &mut Option<Value> {
        match key {
            SliceKey::Summary => &mut self.summary,
            SliceKey::Trends => &mut self.trends,
            SliceKey::TopProblems => &mut self.top_problems,
            SliceKey::Inventory => &mut self.inventory,
            SliceKey::Alerts => &mut self.alerts,
            SliceKey::RealtimeInterfaces => &mut self.realtime_interfaces,
            SliceKey::NetworkIoTrend => &mut self.network_io_trend,
        }
    }

    /// Prepend to the realtime log, dropping the oldest entry when full.
    pub fn push_realtime_event(&mut self, record: RealtimeEventRecord) {
        self.realtime_events.push_front(record);
        self.realtime_events.truncate(REALTIME_EVENT_CAPACITY);
    }

    /// Time since the last update, if any.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_updated.map(|t| now - t)
    }

    /// Whether the state is older than `threshold`. Never-updated state is stale.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now).map_or(true, |age| age > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(n: usize) -> RealtimeEventRecord {
        RealtimeEventRecord {
            event_type: "device_status".to_string(),
            event_id: Some(format!("e{n}")),
            payload: json!({}),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_realtime_log_is_bounded_newest_first() {
        let mut state = DashboardState::default();
        for n in 0..60 {
            state.push_realtime_event(record(n));
        }

        assert_eq!(state.realtime_events.len(), REALTIME_EVENT_CAPACITY);
        assert_eq!(state.realtime_events[0].event_id.as_deref(), Some("e59"));
        assert_eq!(
            state.realtime_events.back().and_then(|r| r.event_id.as_deref()),
            Some("e10")
        );
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let mut state = DashboardState::default();
        assert!(state.is_stale(now, Duration::minutes(5)));

        state.last_updated = Some(now - Duration::minutes(2));
        assert!(!state.is_stale(now, Duration::minutes(5)));

        state.last_updated = Some(now - Duration::minutes(6));
        assert!(state.is_stale(now, Duration::minutes(5)));
    }

    #[test]
    fn test_serializes_with_dashboard_names() {
        let state = DashboardState {
            network_io_trend: Some(json!([1, 2])),
            ..Default::default()
        };
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["networkIOTrend"], json!([1, 2]));
        assert_eq!(value["connectionStatus"], json!("disconnected"));
        assert_eq!(value["topProblems"], Value::Null);
        assert_eq!(value["isLoading"], json!(false));
    }

    #[test]
    fn test_slice_accessors_cover_every_key() {
        let mut state = DashboardState::default();
        for key in SliceKey::FETCHABLE {
            *state.slice_mut(key) = Some(json!(key.as_str()));
        }
        for key in SliceKey::FETCHABLE {
            assert_eq!(state.slice(key), Some(&json!(key.as_str())));
        }
    }
}

//! Realtime merge rules.
//!
//! Each push event adjusts the existing `summary`/`topProblems` slices in
//! place instead of forcing a full re-fetch. Slices that were never loaded
//! are left alone; the event is still logged by the store.

use crate::state::{DashboardState, RECENT_ALERTS_CAPACITY};
use chrono::{DateTime, Utc};
use netpulse_core::{AlertCreated, DeviceTransition, EventPayload, InboundEvent};
use serde_json::{json, Map, Value};

/// Apply the reducer for `event`. Returns whether a slice changed.
pub fn apply_event(state: &mut DashboardState, event: &InboundEvent, now: DateTime<Utc>) -> bool {
    match &event.payload {
        EventPayload::DeviceStatus(change) => match (change.transition(), state.summary.as_mut()) {
            (Some(transition), Some(summary)) => {
                apply_device_transition(summary, transition);
                true
            }
            _ => false,
        },
        EventPayload::DeviceUpdate(update) => match (update.transition(), state.summary.as_mut()) {
            (Some(transition), Some(summary)) => {
                apply_device_transition(summary, transition);
                true
            }
            _ => false,
        },
        EventPayload::AlertCreated(alert) => apply_alert(state, alert, now),
        EventPayload::LatencySpike(spike) => match (spike.latency_ms, state.summary.as_mut()) {
            (Some(sample), Some(summary)) => {
                apply_latency_sample(summary, sample);
                true
            }
            _ => false,
        },
        EventPayload::InterfaceThreshold(_) | EventPayload::ClassificationUpdate(_) => false,
    }
}

/// Move one device between the online and offline counters.
///
/// Legacy `up`/`down` counters are adjusted only when present.
pub fn apply_device_transition(summary: &mut Value, transition: DeviceTransition) {
    let Some(devices) = object_entry(summary, "devices") else {
        return;
    };

    let (inc, dec, legacy_inc, legacy_dec) = match transition {
        DeviceTransition::Down => ("offline", "online", "down", "up"),
        DeviceTransition::Up => ("online", "offline", "up", "down"),
    };

    bump(devices, inc, 1);
    bump(devices, dec, -1);
    if devices.contains_key("up") || devices.contains_key("down") {
        bump(devices, legacy_inc, 1);
        bump(devices, legacy_dec, -1);
    }

    let total = counter(devices, "total");
    let online = counter(devices, "online");
    devices.insert("online_percent".to_string(), json!(percent(online, total)));
    if devices.contains_key("up_percent") {
        let up = counter(devices, "up");
        devices.insert("up_percent".to_string(), json!(percent(up, total)));
    }
}

/// Count the alert and prepend it to `topProblems.recent_alerts`.
pub fn apply_alert(state: &mut DashboardState, alert: &AlertCreated, now: DateTime<Utc>) -> bool {
    let mut changed = false;

    if let Some(summary) = state.summary.as_mut() {
        if let Some(active) = object_entry(summary, "active_alerts") {
            bump(active, alert.severity_bucket(), 1);
            if active.contains_key("total") {
                bump(active, "total", 1);
            }
            changed = true;
        }
    }

    if let Some(top_problems) = state.top_problems.as_mut() {
        if let Some(obj) = top_problems.as_object_mut() {
            let entry = obj
                .entry("recent_alerts")
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(recent) = entry {
                recent.insert(0, alert_record(alert, now));
                recent.truncate(RECENT_ALERTS_CAPACITY);
                changed = true;
            }
        }
    }

    changed
}

/// Fold a latency sample into the average (weight 0.2, two decimals).
pub fn apply_latency_sample(summary: &mut Value, sample: f64) {
    let Some(health) = object_entry(summary, "network_health") else {
        return;
    };
    let old = health
        .get("avg_latency_ms")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let avg = ((old * 0.8 + sample * 0.2) * 100.0).round() / 100.0;
    health.insert("avg_latency_ms".to_string(), json!(avg));
}

fn alert_record(alert: &AlertCreated, now: DateTime<Utc>) -> Value {
    json!({
        "device": alert.device_label(),
        "message": alert.message,
        "severity": alert.severity,
        "time": now.to_rfc3339(),
    })
}

/// `round(part / total * 1000) / 10`, or 0 for an empty total.
fn percent(part: i64, total: i64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

/// Nested object under `key`, created if the parent is an object and the
/// key is missing.
fn object_entry<'a>(parent: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
    parent
        .as_object_mut()?
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn counter(obj: &Map<String, Value>, key: &str) -> i64 {
    obj.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// Add `delta`, flooring at zero.
fn bump(obj: &mut Map<String, Value>, key: &str, delta: i64) {
    let value = (counter(obj, key) + delta).max(0);
    obj.insert(key.to_string(), json!(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_core::EventKind;

    fn event(kind: EventKind, payload: Value) -> InboundEvent {
        InboundEvent::from_raw(kind, None, payload).unwrap()
    }

    fn state_with_summary(summary: Value) -> DashboardState {
        DashboardState {
            summary: Some(summary),
            ..Default::default()
        }
    }

    #[test]
    fn test_device_down_moves_counter() {
        let mut state = state_with_summary(json!({
            "devices": {"online": 10, "offline": 0, "total": 10}
        }));
        let ev = event(EventKind::DeviceStatus, json!({"new_state": "CRITICAL"}));

        assert!(apply_event(&mut state, &ev, Utc::now()));
        assert_eq!(
            state.summary.unwrap()["devices"],
            json!({"online": 9, "offline": 1, "total": 10, "online_percent": 90.0})
        );
    }

    #[test]
    fn test_device_up_and_legacy_counters() {
        let mut summary = json!({
            "devices": {"online": 2, "offline": 1, "up": 2, "down": 1, "total": 3, "up_percent": 66.7}
        });
        apply_device_transition(&mut summary, DeviceTransition::Up);

        let devices = &summary["devices"];
        assert_eq!(devices["online"], json!(3));
        assert_eq!(devices["offline"], json!(0));
        assert_eq!(devices["up"], json!(3));
        assert_eq!(devices["down"], json!(0));
        assert_eq!(devices["online_percent"], json!(100.0));
        assert_eq!(devices["up_percent"], json!(100.0));
    }

    #[test]
    fn test_counters_floor_at_zero() {
        let mut summary = json!({"devices": {"online": 0, "offline": 0, "total": 0}});
        apply_device_transition(&mut summary, DeviceTransition::Down);

        let devices = &summary["devices"];
        assert_eq!(devices["online"], json!(0));
        assert_eq!(devices["offline"], json!(1));
        assert_eq!(devices["online_percent"], json!(0.0));
    }

    #[test]
    fn test_percent_rounds_to_one_decimal() {
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_unknown_state_is_ignored() {
        let mut state = state_with_summary(json!({"devices": {"online": 1, "total": 1}}));
        let before = state.clone();
        let ev = event(EventKind::DeviceStatus, json!({"new_state": "WARNING"}));

        assert!(!apply_event(&mut state, &ev, Utc::now()));
        assert_eq!(state, before);
    }

    #[test]
    fn test_device_update_offline() {
        let mut state = state_with_summary(json!({"devices": {"online": 4, "offline": 0, "total": 4}}));
        let ev = event(EventKind::DeviceUpdate, json!({"ip": "10.0.0.9", "status": "Offline"}));

        assert!(apply_event(&mut state, &ev, Utc::now()));
        assert_eq!(state.summary.unwrap()["devices"]["online_percent"], json!(75.0));
    }

    #[test]
    fn test_alert_buckets_case_insensitive() {
        let mut state = DashboardState {
            summary: Some(json!({"active_alerts": {"critical": 0, "warning": 1, "info": 2}})),
            top_problems: Some(json!({"recent_alerts": []})),
            ..Default::default()
        };
        let ev = event(
            EventKind::AlertCreated,
            json!({"severity": "Critical", "device_ip": "10.0.0.1", "message": "down"}),
        );

        assert!(apply_event(&mut state, &ev, Utc::now()));
        assert_eq!(
            state.summary.unwrap()["active_alerts"],
            json!({"critical": 1, "warning": 1, "info": 2})
        );
        let recent = state.top_problems.unwrap()["recent_alerts"].clone();
        assert_eq!(recent.as_array().unwrap().len(), 1);
        assert_eq!(recent[0]["device"], json!("10.0.0.1"));
        assert_eq!(recent[0]["severity"], json!("Critical"));
    }

    #[test]
    fn test_unrecognized_severity_counts_as_info() {
        let mut state = state_with_summary(json!({"active_alerts": {"info": 0, "total": 0}}));
        let ev = event(EventKind::AlertCreated, json!({"severity": "notice"}));
        apply_event(&mut state, &ev, Utc::now());

        let active = &state.summary.unwrap()["active_alerts"];
        assert_eq!(active["info"], json!(1));
        assert_eq!(active["total"], json!(1));
    }

    #[test]
    fn test_recent_alerts_capped() {
        let existing: Vec<Value> = (0..10).map(|n| json!({"message": format!("old {n}")})).collect();
        let mut state = DashboardState {
            top_problems: Some(json!({"recent_alerts": existing})),
            ..Default::default()
        };
        let alert = AlertCreated {
            device_name: Some("core-sw1".to_string()),
            device_ip: Some("10.0.0.1".to_string()),
            message: Some("new".to_string()),
            severity: Some("warning".to_string()),
        };
        apply_alert(&mut state, &alert, Utc::now());

        let recent = state.top_problems.unwrap()["recent_alerts"].clone();
        let recent = recent.as_array().unwrap();
        assert_eq!(recent.len(), RECENT_ALERTS_CAPACITY);
        assert_eq!(recent[0]["device"], json!("core-sw1"));
        assert_eq!(recent[0]["message"], json!("new"));
        assert_eq!(recent[9]["message"], json!("old 8"));
    }

    #[test]
    fn test_latency_moving_average() {
        let mut summary = json!({"network_health": {"avg_latency_ms": 10.0}});
        apply_latency_sample(&mut summary, 55.55);

        // 10 * 0.8 + 55.55 * 0.2 = 19.11
        assert_eq!(summary["network_health"]["avg_latency_ms"], json!(19.11));
    }

    #[test]
    fn test_missing_summary_skips_counters() {
        let mut state = DashboardState::default();
        let ev = event(EventKind::LatencySpike, json!({"latency": 200.0}));
        assert!(!apply_event(&mut state, &ev, Utc::now()));
        assert!(state.summary.is_none());
    }
}

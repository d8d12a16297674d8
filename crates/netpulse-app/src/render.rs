//! Terminal renderer.

use chrono::{DateTime, Duration, Utc};
use netpulse_store::DashboardState;
use netpulse_sync::Renderer;
use serde_json::Value;
use tracing::info;

/// Paints a one-line dashboard summary to the log.
#[derive(Debug, Clone)]
pub struct LogRenderer {
    stale_after: Duration,
}

impl LogRenderer {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }
}

impl Renderer for LogRenderer {
    fn render(&self, state: &DashboardState) {
        info!(target: "netpulse::render", "{}", summary_line(state, Utc::now(), self.stale_after));
    }
}

fn number(value: Option<&Value>, path: &[&str]) -> Option<f64> {
    path.iter()
        .try_fold(value?, |v, key| v.get(*key))
        .and_then(Value::as_f64)
}

/// Render `state` as one line.
pub fn summary_line(state: &DashboardState, now: DateTime<Utc>, stale_after: Duration) -> String {
    let summary = state.summary.as_ref();
    let mut line = format!("[{}]", state.connection_status);

    match (
        number(summary, &["devices", "online"]),
        number(summary, &["devices", "total"]),
    ) {
        (Some(online), Some(total)) => {
            let pct = number(summary, &["devices", "online_percent"]).unwrap_or(0.0);
            line.push_str(&format!(" devices {online}/{total} online ({pct:.1}%)"));
        }
        _ => line.push_str(" devices -"),
    }

    let alert = |bucket| number(summary, &["active_alerts", bucket]).unwrap_or(0.0);
    line.push_str(&format!(
        " | alerts crit {} warn {} info {}",
        alert("critical"),
        alert("warning"),
        alert("info")
    ));

    if let Some(latency) = number(summary, &["network_health", "avg_latency_ms"]) {
        line.push_str(&format!(" | latency {latency:.2}ms"));
    }

    line.push_str(&format!(" | events {}", state.realtime_events.len()));

    match state.last_updated {
        Some(updated) => line.push_str(&format!(" | updated {}", updated.format("%H:%M:%S"))),
        None => line.push_str(" | never updated"),
    }
    if state.is_stale(now, stale_after) {
        line.push_str(" [STALE]");
    }
    if state.is_loading {
        line.push_str(" [loading]");
    }
    if let Some(error) = &state.error {
        line.push_str(&format!(" [error: {error}]"));
    }
    line
}

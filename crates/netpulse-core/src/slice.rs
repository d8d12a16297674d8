//! Addressing dashboard state slices.

use crate::error::{CoreError, Result};
use crate::status::ConnectionStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Data slice fed by a full-refresh endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceKey {
    #[serde(rename = "summary")]
    Summary,
    #[serde(rename = "trends")]
    Trends,
    #[serde(rename = "topProblems")]
    TopProblems,
    #[serde(rename = "inventory")]
    Inventory,
    #[serde(rename = "alerts")]
    Alerts,
    #[serde(rename = "realtimeInterfaces")]
    RealtimeInterfaces,
    #[serde(rename = "networkIOTrend")]
    NetworkIoTrend,
}

impl SliceKey {
    /// Every slice with a full-refresh endpoint.
    pub const FETCHABLE: [SliceKey; 7] = [
        SliceKey::Summary,
        SliceKey::Trends,
        SliceKey::TopProblems,
        SliceKey::Inventory,
        SliceKey::Alerts,
        SliceKey::RealtimeInterfaces,
        SliceKey::NetworkIoTrend,
    ];

    /// Slices persisted in the snapshot cache.
    pub const CACHEABLE: [SliceKey; 6] = [
        SliceKey::Summary,
        SliceKey::Trends,
        SliceKey::TopProblems,
        SliceKey::Inventory,
        SliceKey::RealtimeInterfaces,
        SliceKey::NetworkIoTrend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trends => "trends",
            Self::TopProblems => "topProblems",
            Self::Inventory => "inventory",
            Self::Alerts => "alerts",
            Self::RealtimeInterfaces => "realtimeInterfaces",
            Self::NetworkIoTrend => "networkIOTrend",
        }
    }

    pub fn is_cacheable(&self) -> bool {
        Self::CACHEABLE.contains(self)
    }

    /// Path of the backend endpoint, relative to the dashboard API root.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trends => "trends",
            Self::TopProblems => "top-problems",
            Self::Inventory => "inventory",
            Self::Alerts => "alerts",
            Self::RealtimeInterfaces => "realtime/interfaces",
            Self::NetworkIoTrend => "realtime/network-io",
        }
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SliceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::FETCHABLE
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CoreError::UnknownSlice(s.to_string()))
    }
}

/// A single wholesale slice replacement.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceUpdate {
    Data(SliceKey, Value),
    ConnectionStatus(ConnectionStatus),
    LastEventId(Option<String>),
    IsLoading(bool),
    Error(Option<String>),
}

impl SliceUpdate {
    /// Build an update from a slice name and JSON value.
    ///
    /// `realtimeEvents` and `lastUpdated` are maintained by the store itself
    /// and are rejected like any other unknown key.
    pub fn from_json(key: &str, value: Value) -> Result<Self> {
        let invalid = |reason: String| CoreError::InvalidSliceValue {
            slice: key.to_string(),
            reason,
        };

        match key {
            "connectionStatus" => serde_json::from_value(value)
                .map(Self::ConnectionStatus)
                .map_err(|e| invalid(e.to_string())),
            "lastEventId" => match value {
                Value::Null => Ok(Self::LastEventId(None)),
                Value::String(id) => Ok(Self::LastEventId(Some(id))),
                other => Err(invalid(format!("expected string, got {other}"))),
            },
            "isLoading" => value
                .as_bool()
                .map(Self::IsLoading)
                .ok_or_else(|| invalid(format!("expected bool, got {value}"))),
            "error" => match value {
                Value::Null => Ok(Self::Error(None)),
                Value::String(msg) => Ok(Self::Error(Some(msg))),
                other => Err(invalid(format!("expected string, got {other}"))),
            },
            other => Ok(Self::Data(other.parse()?, value)),
        }
    }

    /// Name of the slice this update targets.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Data(key, _) => key.as_str(),
            Self::ConnectionStatus(_) => "connectionStatus",
            Self::LastEventId(_) => "lastEventId",
            Self::IsLoading(_) => "isLoading",
            Self::Error(_) => "error",
        }
    }
}

/// Time window for the trends endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    pub fn token(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for TimeRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1h" => Ok(Self::OneHour),
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(CoreError::InvalidTimeRange(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slice_key_round_trip_names() {
        for key in SliceKey::FETCHABLE {
            assert_eq!(key.as_str().parse::<SliceKey>().unwrap(), key);
        }
        assert!("devices".parse::<SliceKey>().is_err());
    }

    #[test]
    fn test_alerts_not_cacheable() {
        assert!(!SliceKey::Alerts.is_cacheable());
        assert!(SliceKey::NetworkIoTrend.is_cacheable());
    }

    #[test]
    fn test_slice_update_from_json() {
        assert_eq!(
            SliceUpdate::from_json("summary", json!({"a": 1})).unwrap(),
            SliceUpdate::Data(SliceKey::Summary, json!({"a": 1}))
        );
        assert_eq!(
            SliceUpdate::from_json("isLoading", json!(true)).unwrap(),
            SliceUpdate::IsLoading(true)
        );
        assert_eq!(
            SliceUpdate::from_json("connectionStatus", json!("connected")).unwrap(),
            SliceUpdate::ConnectionStatus(ConnectionStatus::Connected)
        );
        assert!(matches!(
            SliceUpdate::from_json("bogus", json!(1)),
            Err(CoreError::UnknownSlice(_))
        ));
        assert!(matches!(
            SliceUpdate::from_json("lastUpdated", json!(1)),
            Err(CoreError::UnknownSlice(_))
        ));
        assert!(matches!(
            SliceUpdate::from_json("isLoading", json!("yes")),
            Err(CoreError::InvalidSliceValue { .. })
        ));
    }

    #[test]
    fn test_time_range_tokens() {
        assert_eq!(TimeRange::default().token(), "24h");
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Week);
        assert!("2w".parse::<TimeRange>().is_err());
    }
}

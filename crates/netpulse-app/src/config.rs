//! Application configuration.

use crate::error::{AppError, AppResult};
use netpulse_core::TimeRange;
use netpulse_feed::ProcessorConfig;
use netpulse_stream::ConnectionConfig;
use netpulse_sync::{FallbackConfig, RefreshConfig, RenderConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Push-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// First reconnect delay (ms). Default: 1,000.
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Reconnect delay cap (ms). Default: 30,000.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Expected server keep-alive period (ms). Default: 30,000.
    #[serde(default = "default_server_heartbeat_interval_ms")]
    pub server_heartbeat_interval_ms: u64,
    /// Watchdog timeout as a multiple of the keep-alive period. Default: 1.5.
    #[serde(default = "default_heartbeat_timeout_factor")]
    pub heartbeat_timeout_factor: f64,
    /// Event batching quiet period (ms). Default: 100.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Remembered event ids. Default: 100.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_server_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_factor() -> f64 {
    1.5
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_dedup_capacity() -> usize {
    100
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            server_heartbeat_interval_ms: default_server_heartbeat_interval_ms(),
            heartbeat_timeout_factor: default_heartbeat_timeout_factor(),
            debounce_ms: default_debounce_ms(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl From<StreamSettings> for ConnectionConfig {
    fn from(cfg: StreamSettings) -> Self {
        Self {
            url: String::new(), // Set separately
            initial_retry_delay: Duration::from_millis(cfg.reconnect_initial_delay_ms),
            max_retry_delay: Duration::from_millis(cfg.reconnect_max_delay_ms),
            server_heartbeat_interval: Duration::from_millis(cfg.server_heartbeat_interval_ms),
            heartbeat_timeout_factor: cfg.heartbeat_timeout_factor,
            processor: ProcessorConfig {
                debounce: Duration::from_millis(cfg.debounce_ms),
                dedup_capacity: cfg.dedup_capacity,
            },
        }
    }
}

/// Refresh and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Full-refresh period while disconnected (ms). Default: 30,000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Refresh on visibility if older than this (ms). Default: 30,000.
    #[serde(default = "default_freshness_threshold_ms")]
    pub freshness_threshold_ms: u64,
    /// Per-slice fetch timeout (ms). Default: 15,000.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Initial trends range. Default: 24h.
    #[serde(default)]
    pub default_time_range: TimeRange,
    /// Scan job poll period (ms). Default: 2,000.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_freshness_threshold_ms() -> u64 {
    30_000
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_job_poll_interval_ms() -> u64 {
    2_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            freshness_threshold_ms: default_freshness_threshold_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            default_time_range: TimeRange::default(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
        }
    }
}

impl SyncSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }
}

impl From<&SyncSettings> for FallbackConfig {
    fn from(cfg: &SyncSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            freshness_threshold: Duration::from_millis(cfg.freshness_threshold_ms),
        }
    }
}

impl From<&SyncSettings> for RefreshConfig {
    fn from(cfg: &SyncSettings) -> Self {
        Self {
            fetch_timeout: cfg.fetch_timeout(),
            time_range: cfg.default_time_range,
        }
    }
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Directory holding the snapshot file.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Snapshots older than this are ignored. Default: 168 (7 days).
    #[serde(default = "default_cache_max_age_hours")]
    pub max_age_hours: i64,
    /// Snapshot writes within this window are coalesced into one. 0 writes
    /// on every mutation. Default: 1000.
    #[serde(default = "default_cache_write_behind_ms")]
    pub write_behind_ms: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_dir() -> String {
    "./data/cache".to_string()
}

fn default_cache_max_age_hours() -> i64 {
    netpulse_store::DEFAULT_CACHE_MAX_AGE_HOURS
}

fn default_cache_write_behind_ms() -> u64 {
    1000
}

impl CacheSettings {
    pub fn write_behind(&self) -> Option<Duration> {
        (self.write_behind_ms > 0).then(|| Duration::from_millis(self.write_behind_ms))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: default_cache_dir(),
            max_age_hours: default_cache_max_age_hours(),
            write_behind_ms: default_cache_write_behind_ms(),
        }
    }
}

/// Terminal rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Frame period (ms). Default: 16.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Data older than this is marked stale (ms). Default: 300,000.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_stale_after_ms() -> u64 {
    300_000
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl From<&RenderSettings> for RenderConfig {
    fn from(cfg: &RenderSettings) -> Self {
        Self {
            frame_interval: Duration::from_millis(cfg.frame_interval_ms),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Event stream path under `base_url`.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_stream_path() -> String {
    "/api/events/stream".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            stream: StreamSettings::default(),
            sync: SyncSettings::default(),
            cache: CacheSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from `NETPULSE_CONFIG`, falling back to defaults if absent.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("NETPULSE_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if self.stream.reconnect_initial_delay_ms == 0 {
            return Err(AppError::Config(
                "stream.reconnect_initial_delay_ms must be positive".to_string(),
            ));
        }
        if self.stream.dedup_capacity == 0 {
            return Err(AppError::Config(
                "stream.dedup_capacity must be positive".to_string(),
            ));
        }
        if self.sync.poll_interval_ms == 0 || self.sync.job_poll_interval_ms == 0 {
            return Err(AppError::Config("poll intervals must be positive".to_string()));
        }
        if self.render.frame_interval_ms == 0 {
            return Err(AppError::Config(
                "render.frame_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Full event stream URL.
    pub fn stream_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.stream_path.trim_start_matches('/')
        )
    }

    /// Connection settings with the stream URL filled in.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config: ConnectionConfig = self.stream.clone().into();
        config.url = self.stream_url();
        config
    }

    pub fn cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache.max_age_hours)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.render.stale_after_ms as i64)
    }
}

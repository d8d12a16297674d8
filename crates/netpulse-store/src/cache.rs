//! Snapshot cache for instant startup renders.
//!
//! The cacheable slices are written as one JSON document under a fixed key:
//! `{"timestamp": <unix ms>, "data": {"summary": ..., ...}}`. A snapshot older
//! than the max age is never hydrated.

use crate::error::{CacheError, CacheResult};
use crate::state::DashboardState;
use chrono::{DateTime, Duration, TimeZone, Utc};
use netpulse_core::SliceKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key of the dashboard snapshot.
pub const CACHE_KEY: &str = "netpulse_dashboard_cache";

/// Snapshots older than this are ignored (7 days).
pub const DEFAULT_CACHE_MAX_AGE_HOURS: i64 = 7 * 24;

/// Key-value persistence backend.
pub trait CacheStorage: Send + Sync {
    fn read(&self, key: &str) -> CacheResult<Option<String>>;

    fn write(&self, key: &str, value: &str) -> CacheResult<()>;

    fn remove(&self, key: &str) -> CacheResult<()>;
}

/// One JSON file per key under a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(?e, dir = %dir.display(), "Failed to create cache directory");
        }
        Self { dir }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStorage for FileStorage {
    fn read(&self, key: &str) -> CacheResult<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        let target = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process storage with an optional size quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(CacheError::QuotaExceeded {
                    needed: value.len(),
                    quota,
                });
            }
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Persisted copy of the cacheable slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Write time, unix milliseconds.
    pub timestamp: i64,
    pub data: Map<String, Value>,
}

impl CacheSnapshot {
    /// Capture the cacheable slices of `state`.
    pub fn capture(state: &DashboardState, now: DateTime<Utc>) -> Self {
        let data = SliceKey::CACHEABLE
            .into_iter()
            .map(|key| {
                let value = state.slice(key).cloned().unwrap_or(Value::Null);
                (key.as_str().to_string(), value)
            })
            .collect();

        Self {
            timestamp: now.timestamp_millis(),
            data,
        }
    }

    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.written_at().map(|t| now - t)
    }

    /// Copy the cached slices and write time into `state`.
    ///
    /// Unknown keys and `null` values are skipped.
    pub fn hydrate(&self, state: &mut DashboardState) {
        for key in SliceKey::CACHEABLE {
            match self.data.get(key.as_str()) {
                Some(Value::Null) | None => {}
                Some(value) => *state.slice_mut(key) = Some(value.clone()),
            }
        }
        state.last_updated = self.written_at();
    }
}

/// Reads and writes the dashboard snapshot through a `CacheStorage`.
#[derive(Clone)]
pub struct SnapshotCache {
    storage: Arc<dyn CacheStorage>,
    key: String,
    max_age: Duration,
}

impl SnapshotCache {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            key: CACHE_KEY.to_string(),
            max_age: Duration::hours(DEFAULT_CACHE_MAX_AGE_HOURS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn save(&self, state: &DashboardState, now: DateTime<Utc>) -> CacheResult<()> {
        let snapshot = CacheSnapshot::capture(state, now);
        let encoded = serde_json::to_string(&snapshot)?;
        self.storage.write(&self.key, &encoded)?;
        debug!(bytes = encoded.len(), "Dashboard snapshot cached");
        Ok(())
    }

    /// Load the snapshot if present and younger than the max age.
    pub fn load(&self, now: DateTime<Utc>) -> CacheResult<Option<CacheSnapshot>> {
        let Some(raw) = self.storage.read(&self.key)? else {
            return Ok(None);
        };

        let snapshot: CacheSnapshot = serde_json::from_str(&raw)?;
        let age = snapshot
            .age(now)
            .ok_or_else(|| CacheError::Corrupt(format!("bad timestamp {}", snapshot.timestamp)))?;

        if age >= self.max_age {
            debug!(age_hours = age.num_hours(), "Cached snapshot expired");
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    pub fn clear(&self) -> CacheResult<()> {
        self.storage.remove(&self.key)
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("key", &self.key)
            .field("max_age_hours", &self.max_age.num_hours())
            .finish()
    }
}

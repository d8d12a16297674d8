//! Background job progress polling.
//!
//! Scan jobs report progress only by polling. One loop runs per job id and
//! ends on a terminal status or `cancel`.

use crate::client::JobStatusSource;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Statuses after which a job never changes again.
pub const TERMINAL_STATUSES: [&str; 4] = ["completed", "stopped", "error", "failed"];

/// Default job poll period.
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Progress report for a scan job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStatus {
    /// Job id as requested (not read from the response).
    #[serde(skip_deserializing)]
    pub id: String,
    pub status: String,
    pub progress: f64,
    pub scanned_hosts: u64,
    pub total_hosts: u64,
    pub total_found: u64,
    /// Devices discovered since the previous poll. The backend drains this
    /// buffer on every read.
    pub new_devices: Vec<Value>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        let status = self.status.to_ascii_lowercase();
        TERMINAL_STATUSES.contains(&status.as_str())
    }
}

type ActiveJobs = DashMap<String, (u64, JoinHandle<()>)>;

/// Polls job status until each watched job finishes.
pub struct JobPoller {
    source: Arc<dyn JobStatusSource>,
    interval: Duration,
    active: Arc<ActiveJobs>,
    generation: AtomicU64,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            active: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Start polling `job_id`, reporting every status to `on_status`.
    ///
    /// Returns false if the job is already being watched.
    pub fn watch<F>(&self, job_id: &str, on_status: F) -> bool
    where
        F: Fn(&JobStatus) + Send + Sync + 'static,
    {
        let slot = match self.active.entry(job_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(job_id, "Job already watched");
                return false;
            }
            Entry::Vacant(slot) => slot,
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let source = self.source.clone();
        let active = self.active.clone();
        let period = self.interval;
        let id = job_id.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match source.job_status(&id).await {
                    Ok(status) => {
                        on_status(&status);
                        if status.is_terminal() {
                            info!(job_id = %id, status = %status.status, "Job finished");
                            break;
                        }
                    }
                    Err(e) => warn!(job_id = %id, error = %e, "Job status poll failed"),
                }
            }
            active.remove_if(&id, |_, (g, _)| *g == generation);
        });

        slot.insert((generation, handle));
        info!(job_id, interval_ms = period.as_millis() as u64, "Watching job");
        true
    }

    /// Stop watching `job_id`. Returns false if it was not watched.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.active.remove(job_id) {
            Some((_, (_, handle))) => {
                handle.abort();
                info!(job_id, "Job watch cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let ids: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    pub fn is_watching(&self, job_id: &str) -> bool {
        self.active.contains_key(job_id)
    }

    pub fn active_jobs(&self) -> usize {
        self.active.len()
    }
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("interval", &self.interval)
            .field("active_jobs", &self.active_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SyncError, SyncResult};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted statuses; repeats "running" when exhausted.
    #[derive(Default)]
    struct ScriptedJobs {
        script: Mutex<VecDeque<SyncResult<&'static str>>>,
        polls: AtomicU64,
    }

    impl ScriptedJobs {
        fn new(script: Vec<SyncResult<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                polls: AtomicU64::new(0),
            })
        }

        fn polls(&self) -> u64 {
            self.polls.load(Ordering::Relaxed)
        }
    }

    impl JobStatusSource for ScriptedJobs {
        fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, SyncResult<JobStatus>> {
            self.polls.fetch_add(1, Ordering::Relaxed);
            let next = self.script.lock().pop_front().unwrap_or(Ok("running"));
            async move {
                next.map(|status| JobStatus {
                    id: job_id.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                })
            }
            .boxed()
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&JobStatus) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |s: &JobStatus| sink.lock().push(s.status.clone()))
    }

    #[test]
    fn test_terminal_statuses() {
        for status in ["completed", "stopped", "error", "failed", "Completed"] {
            let job = JobStatus {
                status: status.to_string(),
                ..Default::default()
            };
            assert!(job.is_terminal(), "{status}");
        }
        let running = JobStatus {
            status: "running".to_string(),
            ..Default::default()
        };
        assert!(!running.is_terminal());
    }

    #[test]
    fn test_status_parses_backend_shape() {
        let status: JobStatus = serde_json::from_value(serde_json::json!({
            "id": 42,
            "status": "running",
            "progress": 37.5,
            "total_found": 3,
            "scanned_hosts": 96,
            "total_hosts": 254,
            "new_devices": [],
            "error": null
        }))
        .unwrap();

        assert_eq!(status.id, "");
        assert_eq!(status.scanned_hosts, 96);
        assert_eq!(status.progress, 37.5);
        assert!(status.new_devices.is_empty());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_completed_status_with_discovered_devices() {
        let status: JobStatus = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "status": "completed",
            "progress": 100,
            "total_found": 2,
            "scanned_hosts": 254,
            "total_hosts": 254,
            "new_devices": [
                {"ip": "10.0.0.5", "hostname": "printer-2", "mac": "00:11:22:33:44:55"},
                {"ip": "10.0.0.9"}
            ],
            "error": null
        }))
        .unwrap();

        assert_eq!(status.progress, 100.0);
        assert_eq!(status.total_found, 2);
        assert_eq!(status.new_devices.len(), 2);
        assert_eq!(status.new_devices[0]["ip"], "10.0.0.5");
        assert!(status.error.is_none());
        assert!(status.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_terminal() {
        let source = ScriptedJobs::new(vec![Ok("running"), Ok("running"), Ok("completed")]);
        let poller = JobPoller::new(source.clone(), DEFAULT_JOB_POLL_INTERVAL);
        let (seen, on_status) = recorder();

        assert!(poller.watch("scan-1", on_status));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(*seen.lock(), vec!["running", "running", "completed"]);
        assert_eq!(source.polls(), 3);
        assert!(!poller.is_watching("scan-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_is_retried() {
        let source = ScriptedJobs::new(vec![
            Err(SyncError::Timeout(Duration::from_secs(15))),
            Ok("failed"),
        ]);
        let poller = JobPoller::new(source.clone(), DEFAULT_JOB_POLL_INTERVAL);
        let (seen, on_status) = recorder();

        poller.watch("scan-2", on_status);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*seen.lock(), vec!["failed"]);
        assert_eq!(source.polls(), 2);
        assert_eq!(poller.active_jobs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_loop_per_job_and_cancel() {
        let source = ScriptedJobs::new(vec![]);
        let poller = JobPoller::new(source.clone(), DEFAULT_JOB_POLL_INTERVAL);

        assert!(poller.watch("scan-3", |_| {}));
        assert!(!poller.watch("scan-3", |_| {}));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(source.polls(), 3);

        assert!(poller.cancel("scan-3"));
        assert!(!poller.cancel("scan-3"));
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(source.polls(), 3);
    }
}

//! Push/poll fallback coordination.
//!
//! While the push channel is down a single loop runs a full refresh every
//! poll interval. The loop is stopped as soon as the channel reconnects.
//! Becoming visible after being hidden triggers one immediate refresh when
//! the state is older than the freshness threshold.

use crate::refresh::{RefreshReason, RefreshTrigger};
use chrono::Utc;
use netpulse_core::ConnectionStatus;
use netpulse_store::StateStore;
use netpulse_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Full-refresh period while disconnected.
    pub poll_interval: Duration,
    /// State older than this is refreshed when the view becomes visible.
    pub freshness_threshold: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            freshness_threshold: Duration::from_secs(30),
        }
    }
}

struct Inner {
    config: FallbackConfig,
    trigger: Arc<dyn RefreshTrigger>,
    store: Arc<StateStore>,
    status: RwLock<ConnectionStatus>,
    hidden: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    polls: AtomicU64,
}

/// Switches between push-driven and poll-driven refresh.
#[derive(Clone)]
pub struct FallbackCoordinator {
    inner: Arc<Inner>,
}

impl FallbackCoordinator {
    pub fn new(
        config: FallbackConfig,
        trigger: Arc<dyn RefreshTrigger>,
        store: Arc<StateStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                trigger,
                store,
                status: RwLock::new(ConnectionStatus::Disconnected),
                hidden: AtomicBool::new(false),
                poll_task: Mutex::new(None),
                polls: AtomicU64::new(0),
            }),
        }
    }

    /// Connection status listener.
    pub fn on_connection_change(&self, status: ConnectionStatus) {
        *self.inner.status.write() = status;
        match status {
            ConnectionStatus::Disconnected => self.start_polling(),
            ConnectionStatus::Connected => self.stop_polling(),
            ConnectionStatus::Connecting => {}
        }
    }

    /// Visibility listener.
    pub fn on_visibility_change(&self, visible: bool) {
        let was_hidden = self.inner.hidden.swap(!visible, Ordering::SeqCst);
        if !visible || !was_hidden {
            debug!(visible, "Visibility unchanged or hidden");
            return;
        }

        let threshold =
            chrono::Duration::milliseconds(self.inner.config.freshness_threshold.as_millis() as i64);
        let stale = self.inner.store.read(|s| s.is_stale(Utc::now(), threshold));
        if stale {
            info!("View visible with stale data, refreshing");
            let trigger = self.inner.trigger.clone();
            tokio::spawn(async move { trigger.refresh(RefreshReason::Visibility).await });
        }

        if *self.inner.status.read() == ConnectionStatus::Disconnected {
            self.start_polling();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .poll_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.load(Ordering::SeqCst)
    }

    /// Refreshes run by the poll loop so far.
    pub fn poll_count(&self) -> u64 {
        self.inner.polls.load(Ordering::Relaxed)
    }

    /// Stop polling for good (shutdown).
    pub fn shutdown(&self) {
        self.stop_polling();
    }

    fn start_polling(&self) {
        let mut task = self.inner.poll_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let period = self.inner.config.poll_interval;
        let inner = self.inner.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.polls.fetch_add(1, Ordering::Relaxed);
                debug!("Fallback poll");
                inner.trigger.refresh(RefreshReason::Poll).await;
            }
        }));

        Metrics::fallback_polling(true);
        info!(interval_ms = period.as_millis() as u64, "Fallback polling started");
    }

    fn stop_polling(&self) {
        if let Some(task) = self.inner.poll_task.lock().take() {
            task.abort();
            Metrics::fallback_polling(false);
            info!("Fallback polling stopped");
        }
    }
}

impl std::fmt::Debug for FallbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackCoordinator")
            .field("config", &self.inner.config)
            .field("status", &*self.inner.status.read())
            .field("polling", &self.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use netpulse_core::SliceUpdate;
    use netpulse_store::{DashboardState, MemoryStorage, SnapshotCache};
    use serde_json::json;

    #[derive(Default)]
    struct CountingTrigger {
        reasons: Mutex<Vec<RefreshReason>>,
    }

    impl CountingTrigger {
        fn count(&self, reason: RefreshReason) -> usize {
            self.reasons.lock().iter().filter(|r| **r == reason).count()
        }
    }

    impl RefreshTrigger for CountingTrigger {
        fn refresh(&self, reason: RefreshReason) -> BoxFuture<'_, ()> {
            self.reasons.lock().push(reason);
            async {}.boxed()
        }
    }

    fn coordinator(store: Arc<StateStore>) -> (FallbackCoordinator, Arc<CountingTrigger>) {
        let trigger = Arc::new(CountingTrigger::default());
        let coordinator = FallbackCoordinator::new(FallbackConfig::default(), trigger.clone(), store);
        (coordinator, trigger)
    }

    /// Store whose last update was `age` ago.
    fn store_aged(age: chrono::Duration) -> Arc<StateStore> {
        let cache = SnapshotCache::new(Arc::new(MemoryStorage::new()));
        let state = DashboardState {
            summary: Some(json!({})),
            ..Default::default()
        };
        cache.save(&state, Utc::now() - age).unwrap();
        let store = StateStore::with_cache(cache);
        assert!(store.load_from_cache());
        Arc::new(store)
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_while_disconnected() {
        let (coordinator, trigger) = coordinator(Arc::new(StateStore::new()));
        coordinator.on_connection_change(ConnectionStatus::Disconnected);
        assert!(coordinator.is_polling());

        advance(95).await;
        assert_eq!(trigger.count(RefreshReason::Poll), 3);
        coordinator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_disconnects_keep_one_loop() {
        let (coordinator, trigger) = coordinator(Arc::new(StateStore::new()));
        coordinator.on_connection_change(ConnectionStatus::Disconnected);
        advance(10).await;
        coordinator.on_connection_change(ConnectionStatus::Connecting);
        coordinator.on_connection_change(ConnectionStatus::Disconnected);
        coordinator.on_connection_change(ConnectionStatus::Disconnected);

        // Original loop keeps its schedule: 30s, 60s.
        advance(55).await;
        assert_eq!(trigger.count(RefreshReason::Poll), 2);
        assert_eq!(coordinator.poll_count(), 2);
        coordinator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_stops_polling() {
        let (coordinator, trigger) = coordinator(Arc::new(StateStore::new()));
        coordinator.on_connection_change(ConnectionStatus::Disconnected);
        advance(35).await;
        assert_eq!(trigger.count(RefreshReason::Poll), 1);

        coordinator.on_connection_change(ConnectionStatus::Connected);
        coordinator.on_connection_change(ConnectionStatus::Connected);
        assert!(!coordinator.is_polling());

        advance(120).await;
        assert_eq!(trigger.count(RefreshReason::Poll), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polling_before_first_disconnect() {
        let (coordinator, trigger) = coordinator(Arc::new(StateStore::new()));
        advance(120).await;
        assert!(!coordinator.is_polling());
        assert!(trigger.reasons.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_with_stale_state_refreshes_once() {
        let (coordinator, trigger) = coordinator(store_aged(chrono::Duration::seconds(90)));
        coordinator.on_connection_change(ConnectionStatus::Connected);

        coordinator.on_visibility_change(false);
        coordinator.on_visibility_change(true);
        coordinator.on_visibility_change(true);
        advance(1).await;

        assert_eq!(trigger.count(RefreshReason::Visibility), 1);
        assert!(!coordinator.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_with_fresh_state_does_nothing() {
        let store = Arc::new(StateStore::new());
        store.apply(SliceUpdate::IsLoading(false));
        let (coordinator, trigger) = coordinator(store);
        coordinator.on_connection_change(ConnectionStatus::Connected);

        coordinator.on_visibility_change(false);
        coordinator.on_visibility_change(true);
        advance(1).await;

        assert_eq!(trigger.count(RefreshReason::Visibility), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_while_disconnected_starts_polling() {
        let (coordinator, trigger) = coordinator(store_aged(chrono::Duration::minutes(10)));

        coordinator.on_visibility_change(false);
        coordinator.on_visibility_change(true);
        assert!(coordinator.is_polling());

        advance(31).await;
        assert_eq!(trigger.count(RefreshReason::Visibility), 1);
        assert_eq!(trigger.count(RefreshReason::Poll), 1);
        coordinator.shutdown();
    }
}

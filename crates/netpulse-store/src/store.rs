//! Observable state store.
//!
//! Every mutation goes through `update_state`/`apply` or
//! `merge_realtime_update`. Each call stamps `last_updated`, persists the
//! snapshot (immediately, or coalesced when write-behind is enabled), then
//! notifies subscribers once, synchronously and in subscription order, with
//! the post-update state.

use crate::cache::SnapshotCache;
use crate::error::{StoreError, StoreResult};
use crate::reducer;
use crate::state::{DashboardState, RealtimeEventRecord};
use crate::writer::SnapshotWriter;
use chrono::Utc;
use netpulse_core::{InboundEvent, SliceUpdate};
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

type Listener = Arc<dyn Fn(&DashboardState) + Send + Sync>;

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Single source of truth for dashboard state.
pub struct StateStore {
    state: RwLock<DashboardState>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    /// Held across mutate-then-notify so notifications never interleave.
    /// Reentrant: a listener may itself update the store.
    writer: ReentrantMutex<()>,
    cache: Option<SnapshotWriter>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Store without persistence.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DashboardState::default()),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            writer: ReentrantMutex::new(()),
            cache: None,
        }
    }

    pub fn with_cache(cache: SnapshotCache) -> Self {
        Self {
            cache: Some(SnapshotWriter::new(cache)),
            ..Self::new()
        }
    }

    /// Coalesce snapshot writes made within `window` into one write on the
    /// blocking pool. Only applies to mutations made inside a tokio runtime.
    pub fn with_write_behind(mut self, window: Duration) -> Self {
        self.cache = self.cache.map(|writer| writer.with_write_behind(window));
        self
    }

    /// Copy of the current state.
    pub fn get_state(&self) -> DashboardState {
        self.state.read().clone()
    }

    /// Read the state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.state.read())
    }

    /// Replace a slice by name.
    ///
    /// Unknown keys are rejected with a warning and leave the state untouched.
    pub fn update_state(&self, key: &str, value: Value) -> StoreResult<()> {
        match SliceUpdate::from_json(key, value) {
            Ok(update) => {
                self.apply(update);
                Ok(())
            }
            Err(e) => {
                let err = StoreError::from(e);
                warn!(key = %key, error = %err, "Rejected state update");
                Err(err)
            }
        }
    }

    /// Replace a slice.
    pub fn apply(&self, update: SliceUpdate) {
        let key = update.key();
        self.mutate(|state| assign(state, update));
        trace!(key, "Slice updated");
    }

    /// Apply several updates with a single notification.
    pub fn apply_all(&self, updates: impl IntoIterator<Item = SliceUpdate>) {
        let updates: Vec<SliceUpdate> = updates.into_iter().collect();
        if updates.is_empty() {
            return;
        }
        self.mutate(|state| updates.into_iter().for_each(|update| assign(state, update)));
    }

    /// Fold a push event into `summary`/`topProblems` and the realtime log.
    pub fn merge_realtime_update(&self, event: &InboundEvent) {
        let now = Utc::now();
        let changed = self.mutate(|state| {
            let changed = reducer::apply_event(state, event, now);
            state.push_realtime_event(RealtimeEventRecord::from(event));
            if let Some(id) = &event.event_id {
                state.last_event_id = Some(id.clone());
            }
            changed
        });
        debug!(kind = %event.kind, changed, "Realtime update merged");
    }

    /// Register a listener called after every update.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DashboardState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Persist the cacheable slices now, superseding any deferred write.
    /// Failures are logged, never returned.
    pub fn save_to_cache(&self) {
        let Some(writer) = &self.cache else {
            return;
        };
        let state = self.state.read().clone();
        writer.flush(&state);
    }

    /// Hydrate from the snapshot cache.
    ///
    /// Returns true and notifies subscribers if a snapshot younger than the
    /// max age was applied; otherwise leaves the state untouched.
    pub fn load_from_cache(&self) -> bool {
        let Some(writer) = &self.cache else {
            return false;
        };

        let snapshot = match writer.cache().load(Utc::now()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable dashboard snapshot");
                return false;
            }
        };

        let _writer = self.writer.lock();
        let state = {
            let mut state = self.state.write();
            snapshot.hydrate(&mut state);
            state.clone()
        };
        info!(
            written_at = ?snapshot.written_at(),
            "Dashboard hydrated from cache"
        );
        self.notify(&state);
        true
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut DashboardState) -> R) -> R {
        let _writer = self.writer.lock();
        let (result, state) = {
            let mut state = self.state.write();
            let result = f(&mut state);
            state.last_updated = Some(Utc::now());
            (result, state.clone())
        };

        if let Some(writer) = &self.cache {
            writer.record(&state);
        }

        self.notify(&state);
        result
    }

    fn notify(&self, state: &DashboardState) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

fn assign(state: &mut DashboardState, update: SliceUpdate) {
    match update {
        SliceUpdate::Data(slice, value) => *state.slice_mut(slice) = Some(value),
        SliceUpdate::ConnectionStatus(status) => state.connection_status = status,
        SliceUpdate::LastEventId(id) => state.last_event_id = id,
        SliceUpdate::IsLoading(loading) => state.is_loading = loading,
        SliceUpdate::Error(error) => state.error = error,
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("subscribers", &self.subscriber_count())
            .field("cache", &self.cache)
            .finish()
    }
}

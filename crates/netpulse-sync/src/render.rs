//! Frame-coalesced rendering.
//!
//! Any number of `schedule_render` calls within one frame produce a single
//! render of the most recent state. A scheduled frame cannot be cancelled.
//! Render passes never overlap: a frame that fires while the previous pass
//! is still painting waits for it, then paints the newest state.

use netpulse_store::{DashboardState, StateStore, SubscriptionId};
use netpulse_telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Presentation layer paint entry point.
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send + Sync {
    fn render(&self, state: &DashboardState);
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Frame period (~60 Hz).
    pub frame_interval: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

struct Inner {
    renderer: Arc<dyn Renderer>,
    frame_interval: Duration,
    latest: Mutex<Option<DashboardState>>,
    painting: Mutex<()>,
    scheduled: AtomicBool,
    renders: AtomicU64,
}

impl Inner {
    fn on_frame(&self) {
        self.scheduled.store(false, Ordering::SeqCst);
        let _painting = self.painting.lock();
        let Some(state) = self.latest.lock().take() else {
            return;
        };
        self.renderer.render(&state);
        self.renders.fetch_add(1, Ordering::Relaxed);
        Metrics::render();
    }
}

/// Coalesces state notifications into at most one render per frame.
#[derive(Clone)]
pub struct RenderScheduler {
    inner: Arc<Inner>,
}

impl RenderScheduler {
    pub fn new(config: RenderConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                renderer,
                frame_interval: config.frame_interval,
                latest: Mutex::new(None),
                painting: Mutex::new(()),
                scheduled: AtomicBool::new(false),
                renders: AtomicU64::new(0),
            }),
        }
    }

    /// Record `state` as the latest and arm the next frame if needed.
    pub fn schedule_render(&self, state: DashboardState) {
        *self.inner.latest.lock() = Some(state);
        if self.inner.scheduled.swap(true, Ordering::SeqCst) {
            trace!("Render already scheduled");
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.frame_interval).await;
            inner.on_frame();
        });
    }

    /// Render on every store notification.
    pub fn attach(&self, store: &StateStore) -> SubscriptionId {
        let scheduler = self.clone();
        store.subscribe(move |state| scheduler.schedule_render(state.clone()))
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduled.load(Ordering::SeqCst)
    }

    pub fn render_count(&self) -> u64 {
        self.inner.renders.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("frame_interval", &self.inner.frame_interval)
            .field("scheduled", &self.is_scheduled())
            .field("renders", &self.render_count())
            .finish()
    }
}

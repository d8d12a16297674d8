//! Single-owner cancellable timers.
//!
//! Each concern that needs a timer (debounce, retry, polling, ...) owns one
//! `TimerSlot`. Arming a slot replaces whatever was pending in it, so a
//! concern can never have two live timers.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// One replace-on-rearm timer.
pub struct TimerSlot {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Run `on_fire` after `delay`, cancelling any pending timer in this slot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.arm_async(delay, async move { on_fire() });
    }

    /// Async variant of [`TimerSlot::arm`].
    pub fn arm_async<Fut>(&self, delay: Duration, on_fire: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });

        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
        trace!(timer = self.name, delay_ms = delay.as_millis() as u64, "Timer armed");
    }

    /// Cancel the pending timer. Returns `true` if one was still pending.
    pub fn cancel(&self) -> bool {
        match self.handle.lock().take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                if pending {
                    trace!(timer = self.name, "Timer cancelled");
                }
                pending
            }
            None => false,
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(task) = self.handle.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("name", &self.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}

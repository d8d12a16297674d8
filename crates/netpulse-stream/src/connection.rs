//! Push-channel connection manager.
//!
//! Owns the connection lifecycle:
//! `Disconnected → Connecting → Connected → Disconnected → Connecting ...`
//!
//! A supervisor task holds the only live transport. Transport errors,
//! server closes and heartbeat timeouts all take the same path: status goes
//! to `Disconnected`, the transport is dropped and a reconnect is scheduled
//! after the current backoff delay. Only `disconnect()` stops the cycle.

use crate::backoff::Backoff;
use crate::error::{StreamError, StreamResult};
use crate::heartbeat::HeartbeatWatchdog;
use crate::message::{parse_frame, StreamMessage};
use crate::sse::{SseDecoder, SseFrame};
use crate::transport::{ByteStream, EventTransport};
use futures_util::StreamExt;
use netpulse_core::{ConnectionStatus, DashboardHandlers};
use netpulse_feed::{EventProcessor, ProcessorConfig};
use netpulse_telemetry::Metrics;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Event stream URL (used by the HTTP transport).
    pub url: String,
    /// First reconnect delay; also the value restored on success.
    pub initial_retry_delay: Duration,
    /// Upper bound for the doubling reconnect delay.
    pub max_retry_delay: Duration,
    /// Keep-alive period the server is expected to honour.
    pub server_heartbeat_interval: Duration,
    /// Watchdog timeout as a multiple of the server keep-alive period.
    pub heartbeat_timeout_factor: f64,
    /// Deduplication and debounce settings.
    pub processor: ProcessorConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            server_heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout_factor: 1.5,
            processor: ProcessorConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Silence allowed before the link is declared dead.
    pub fn heartbeat_timeout(&self) -> Duration {
        HeartbeatWatchdog::timeout_for(self.server_heartbeat_interval, self.heartbeat_timeout_factor)
    }
}

/// Connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub attempts: AtomicU64,
    pub opened: AtomicU64,
    pub failures: AtomicU64,
    pub frames: AtomicU64,
    pub malformed: AtomicU64,
}

impl ConnectionStats {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Handlers registered by the last `initialize` call.
struct Session {
    handlers: Arc<dyn DashboardHandlers>,
    processor: Arc<EventProcessor>,
}

/// The running reconnect loop.
struct Supervisor {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Supervisor {
    fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}

struct Inner {
    config: ConnectionConfig,
    transport: Arc<dyn EventTransport>,
    status: RwLock<ConnectionStatus>,
    /// Serializes status transitions with their callbacks.
    transition: ReentrantMutex<()>,
    session: RwLock<Option<Session>>,
    backoff: Mutex<Backoff>,
    supervisor: Mutex<Option<Supervisor>>,
    stats: ConnectionStats,
}

/// Push-channel connection manager.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, transport: Arc<dyn EventTransport>) -> Self {
        let backoff = Backoff::new(config.initial_retry_delay, config.max_retry_delay);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                status: RwLock::new(ConnectionStatus::Disconnected),
                transition: ReentrantMutex::new(()),
                session: RwLock::new(None),
                backoff: Mutex::new(backoff),
                supervisor: Mutex::new(None),
                stats: ConnectionStats::default(),
            }),
        }
    }

    /// Register handlers and start the first connection attempt.
    ///
    /// A second call replaces the previous handlers (and their pending
    /// events) instead of adding to them, then reconnects.
    pub fn initialize(&self, handlers: Arc<dyn DashboardHandlers>) {
        self.inner.stop_supervisor();

        let processor = EventProcessor::new(self.inner.config.processor.clone(), handlers.clone());
        let previous = self.inner.session.write().replace(Session {
            handlers,
            processor,
        });
        if let Some(previous) = previous {
            previous.processor.clear();
            info!("Connection handlers replaced");
        }

        self.inner.backoff.lock().reset();
        self.connect();
    }

    /// Start (or restart) the connect loop.
    ///
    /// Any existing transport is closed first.
    pub fn connect(&self) {
        if self.inner.session.read().is_none() {
            warn!("connect() called before initialize(), ignoring");
            return;
        }

        self.inner.stop_supervisor();

        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let loop_token = token.clone();
        let task = tokio::spawn(async move { inner.run(loop_token).await });

        *self.inner.supervisor.lock() = Some(Supervisor { token, task });
    }

    /// Close the transport, cancel pending retry and heartbeat timers, and
    /// stay disconnected.
    pub fn disconnect(&self) {
        self.inner.stop_supervisor();
        if let Some(processor) = self.inner.processor() {
            processor.clear();
        }
        self.inner.set_status(None, ConnectionStatus::Disconnected);
        info!("Event stream disconnected");
    }

    /// Disconnect, reset the backoff and connect again immediately.
    pub fn reconnect(&self) {
        self.disconnect();
        self.inner.backoff.lock().reset();
        self.connect();
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.read()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Delay the next failed attempt will wait before retrying.
    pub fn retry_delay(&self) -> Duration {
        self.inner.backoff.lock().current()
    }

    /// Whether the connect loop is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .supervisor
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.inner.stats
    }

    /// Event processor of the current session.
    pub fn processor(&self) -> Option<Arc<EventProcessor>> {
        self.inner.processor()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("target", &self.inner.transport.describe())
            .field("status", &self.status())
            .field("retry_delay", &self.retry_delay())
            .finish()
    }
}

impl Inner {
    fn processor(&self) -> Option<Arc<EventProcessor>> {
        self.session.read().as_ref().map(|s| s.processor.clone())
    }

    fn handlers(&self) -> Option<Arc<dyn DashboardHandlers>> {
        self.session.read().as_ref().map(|s| s.handlers.clone())
    }

    fn stop_supervisor(&self) {
        if let Some(supervisor) = self.supervisor.lock().take() {
            supervisor.stop();
        }
    }

    /// Apply a status transition and notify handlers if it changed.
    ///
    /// Transitions from the connect loop pass its token; once the token is
    /// cancelled the loop can no longer overwrite the status.
    fn set_status(&self, token: Option<&CancellationToken>, status: ConnectionStatus) {
        let _guard = self.transition.lock();
        if token.is_some_and(|t| t.is_cancelled()) {
            return;
        }

        let previous = std::mem::replace(&mut *self.status.write(), status);
        if previous == status {
            return;
        }

        Metrics::stream_state_set(status.as_str());
        info!(from = %previous, to = %status, "Connection status changed");

        if let Some(handlers) = self.handlers() {
            handlers.on_connection_change(status);
        }
    }

    /// Reconnect loop. Runs until cancelled.
    async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }

            self.set_status(Some(&token), ConnectionStatus::Connecting);
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => return,
                outcome = self.run_connection(&token) => outcome,
            };

            let err = outcome.err().unwrap_or(StreamError::StreamClosed);
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            self.set_status(Some(&token), ConnectionStatus::Disconnected);

            let delay = self.backoff.lock().next_delay();
            Metrics::stream_reconnect(err.reason());
            warn!(
                error = %err,
                reason = err.reason(),
                delay_ms = delay.as_millis() as u64,
                "Event stream lost, scheduling reconnect"
            );

            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Open one transport and pump frames until it fails.
    async fn run_connection(&self, token: &CancellationToken) -> StreamResult<()> {
        let timeout = self.config.heartbeat_timeout();
        let stream = tokio::time::timeout(timeout, self.transport.open())
            .await
            .map_err(|_| StreamError::ConnectionFailed("open timed out".to_string()))??;

        self.stats.opened.fetch_add(1, Ordering::Relaxed);
        self.backoff.lock().reset();
        self.set_status(Some(token), ConnectionStatus::Connected);

        let watchdog = HeartbeatWatchdog::new(timeout);
        self.pump(stream, &watchdog).await
    }

    async fn pump(&self, mut stream: ByteStream, watchdog: &HeartbeatWatchdog) -> StreamResult<()> {
        let mut decoder = SseDecoder::new();

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for frame in decoder.feed(&bytes) {
                            watchdog.record_frame();
                            self.handle_frame(frame);
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Event stream read error");
                        return Err(e);
                    }
                    None => {
                        warn!("Event stream ended");
                        return Err(StreamError::StreamClosed);
                    }
                },
                () = watchdog.expired() => {
                    error!(
                        timeout_ms = watchdog.timeout().as_millis() as u64,
                        "Heartbeat timeout"
                    );
                    return Err(StreamError::HeartbeatTimeout);
                }
            }
        }
    }

    fn handle_frame(&self, frame: SseFrame) {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);

        match parse_frame(frame) {
            Ok(StreamMessage::Event(event)) => {
                Metrics::event_received(event.kind.wire_name());
                trace!(kind = %event.kind, event_id = ?event.event_id, "Event received");
                if let Some(processor) = self.processor() {
                    processor.ingest(*event);
                }
            }
            Ok(StreamMessage::KeepAlive) => trace!("Keep-alive received"),
            Ok(StreamMessage::Connected { client_id }) => {
                info!(client_id = ?client_id, "Event stream greeting received");
            }
            Ok(StreamMessage::Ignored(name)) => debug!(event = %name, "Unhandled event type"),
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                Metrics::event_malformed();
                warn!(error = %e, "Dropping malformed event");
            }
        }
    }
}

//! Main application orchestration.
//!
//! Wires the sync engine together:
//! - Snapshot cache hydration for an instant first render
//! - Push channel (SSE) with deduplicated, debounced dispatch into the store
//! - Fallback polling and visibility-driven refreshes
//! - Frame-coalesced rendering
//! - Operator commands on stdin

use crate::command::Command;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::render::LogRenderer;
use netpulse_store::{FileStorage, SnapshotCache, StateStore};
use netpulse_stream::{ConnectionManager, HttpEventTransport};
use netpulse_sync::{
    DashboardClient, FallbackCoordinator, JobPoller, RefreshReason, Refresher, RenderScheduler,
    StoreHandlers,
};
use netpulse_telemetry::Metrics;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<StateStore>,
    connection: ConnectionManager,
    refresher: Arc<Refresher>,
    fallback: FallbackCoordinator,
    scheduler: RenderScheduler,
    jobs: JobPoller,
}

impl Application {
    /// Build every component. Nothing runs until `run`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store = Arc::new(if config.cache.enabled {
            let cache = SnapshotCache::new(Arc::new(FileStorage::new(&config.cache.dir)))
                .with_max_age(config.cache_max_age());
            let store = StateStore::with_cache(cache);
            match config.cache.write_behind() {
                Some(window) => store.with_write_behind(window),
                None => store,
            }
        } else {
            StateStore::new()
        });

        let client = Arc::new(DashboardClient::new(
            config.base_url.clone(),
            config.sync.fetch_timeout(),
        )?);
        let refresher = Arc::new(Refresher::new(
            client.clone(),
            store.clone(),
            (&config.sync).into(),
        ));
        let fallback =
            FallbackCoordinator::new((&config.sync).into(), refresher.clone(), store.clone());
        let scheduler = RenderScheduler::new(
            (&config.render).into(),
            Arc::new(LogRenderer::new(config.stale_after())),
        );

        let transport = Arc::new(HttpEventTransport::new(config.stream_url())?);
        let connection = ConnectionManager::new(config.connection_config(), transport);
        let jobs = JobPoller::new(client, config.sync.job_poll_interval());

        Ok(Self {
            config,
            store,
            connection,
            refresher,
            fallback,
            scheduler,
            jobs,
        })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Run until Ctrl-C or `q`.
    pub async fn run(self) -> AppResult<()> {
        info!(
            base_url = %self.config.base_url,
            stream_url = %self.config.stream_url(),
            "Starting dashboard sync"
        );

        self.scheduler.attach(&self.store);

        if self.store.load_from_cache() {
            info!("Rendering cached dashboard while refreshing");
        }

        let handlers = StoreHandlers::new(self.store.clone()).with_fallback(self.fallback.clone());
        self.connection.initialize(Arc::new(handlers));

        let refresher = self.refresher.clone();
        tokio::spawn(async move {
            refresher.refresh_all(RefreshReason::Initial).await;
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        info!("Commands: r refresh, c reconnect, h/v hide/show, range <1h|24h|7d|30d>, scan <id>, cancel <id>, m metrics, q quit");

        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => match Command::parse(&line) {
                        Ok(Some(Command::Quit)) => {
                            info!("Quit requested");
                            break;
                        }
                        Ok(Some(command)) => self.handle_command(command),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Ignoring input"),
                    },
                    Ok(None) => {
                        info!("stdin closed, running until Ctrl-C");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed, commands disabled");
                        stdin_open = false;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn handle_command(&self, command: Command) {
        match command {
            Command::Refresh => {
                let refresher = self.refresher.clone();
                tokio::spawn(async move {
                    refresher.refresh_all(RefreshReason::Manual).await;
                });
            }
            Command::Reconnect => self.connection.reconnect(),
            Command::Hidden => self.fallback.on_visibility_change(false),
            Command::Visible => self.fallback.on_visibility_change(true),
            Command::Range(range) => {
                let refresher = self.refresher.clone();
                tokio::spawn(async move {
                    if let Err(e) = refresher.set_time_range(range).await {
                        warn!(error = %e, "Range change did not refresh trends");
                    }
                });
            }
            Command::Scan(job_id) => {
                let watching = self.jobs.watch(&job_id, |status| {
                    info!(
                        job_id = %status.id,
                        status = %status.status,
                        progress = status.progress,
                        scanned = status.scanned_hosts,
                        total = status.total_hosts,
                        found = status.total_found,
                        new_devices = status.new_devices.len(),
                        error = ?status.error,
                        "Scan progress"
                    );
                });
                if !watching {
                    info!(job_id = %job_id, "Scan already watched");
                }
            }
            Command::CancelScan(job_id) => {
                if !self.jobs.cancel(&job_id) {
                    info!(job_id = %job_id, "Scan not watched");
                }
            }
            Command::Metrics => match Metrics::gather_text() {
                Ok(text) => info!("\n{text}"),
                Err(e) => error!(error = %AppError::from(e), "Failed to gather metrics"),
            },
            Command::Quit => {}
        }
    }

    fn shutdown(&self) {
        self.connection.disconnect();
        self.fallback.shutdown();
        self.jobs.cancel_all();
        self.store.save_to_cache();

        let stats = self.connection.stats();
        info!(
            attempts = stats.attempts(),
            opened = stats.opened(),
            frames = stats.frames(),
            malformed = stats.malformed(),
            "Shut down"
        );
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("connection", &self.connection)
            .field("fallback", &self.fallback)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

//! Keeping the netpulse dashboard fresh.
//!
//! - `DashboardClient`: REST client for the full-refresh and job endpoints
//! - `Refresher`: concurrent per-slice fetch with timeouts into the store
//! - `FallbackCoordinator`: polling while the push channel is down,
//!   freshness checks on visibility changes
//! - `RenderScheduler`: at most one render per frame with the latest state
//! - `JobPoller`: progress polling for background scan jobs
//! - `StoreHandlers`: push-event handlers writing into the store

pub mod client;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod jobs;
pub mod refresh;
pub mod render;

pub use client::{DashboardClient, JobStatusSource, SliceSource, DEFAULT_FETCH_TIMEOUT};
pub use error::{SyncError, SyncResult};
pub use fallback::{FallbackConfig, FallbackCoordinator};
pub use handlers::StoreHandlers;
pub use jobs::{JobPoller, JobStatus, DEFAULT_JOB_POLL_INTERVAL, TERMINAL_STATUSES};
pub use refresh::{RefreshConfig, RefreshReason, RefreshReport, RefreshTrigger, Refresher};
pub use render::{RenderConfig, RenderScheduler, Renderer};

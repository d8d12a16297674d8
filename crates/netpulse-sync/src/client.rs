//! REST client for the dashboard API.

use crate::error::{SyncError, SyncResult};
use crate::jobs::JobStatus;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use netpulse_core::{SliceKey, TimeRange};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for API requests.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of full-refresh slice data.
pub trait SliceSource: Send + Sync + 'static {
    fn fetch(&self, slice: SliceKey, range: TimeRange) -> BoxFuture<'_, SyncResult<Value>>;
}

/// Source of background job progress.
pub trait JobStatusSource: Send + Sync + 'static {
    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, SyncResult<JobStatus>>;
}

/// Client for the backend's `/api` endpoints.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DashboardClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:5000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL for a slice. Only `trends` takes the range.
    pub fn slice_url(&self, slice: SliceKey, range: TimeRange) -> String {
        let url = format!("{}/api/dashboard/{}", self.base_url, slice.endpoint());
        match slice {
            SliceKey::Trends => format!("{url}?range={}", range.token()),
            _ => url,
        }
    }

    pub fn job_url(&self, job_id: &str) -> String {
        format!("{}/api/scan_progress/{job_id}", self.base_url)
    }

    pub async fn fetch_slice(&self, slice: SliceKey, range: TimeRange) -> SyncResult<Value> {
        let url = self.slice_url(slice, range);
        self.get_json(&url).await
    }

    pub async fn fetch_job_status(&self, job_id: &str) -> SyncResult<JobStatus> {
        let url = self.job_url(job_id);
        let body = self.get_json(&url).await?;
        let mut status: JobStatus = serde_json::from_value(body)
            .map_err(|e| SyncError::InvalidResponse(format!("job {job_id}: {e}")))?;
        status.id = job_id.to_string();
        Ok(status)
    }

    async fn get_json(&self, url: &str) -> SyncResult<Value> {
        debug!(url = %url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.timeout)
            } else {
                SyncError::HttpClient(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Dashboard request failed");
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

impl SliceSource for DashboardClient {
    fn fetch(&self, slice: SliceKey, range: TimeRange) -> BoxFuture<'_, SyncResult<Value>> {
        self.fetch_slice(slice, range).boxed()
    }
}

impl JobStatusSource for DashboardClient {
    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, SyncResult<JobStatus>> {
        self.fetch_job_status(job_id).boxed()
    }
}

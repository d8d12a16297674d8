//! Byte-stream transports for the push channel.

use crate::error::{StreamError, StreamResult};
use futures_util::future::BoxFuture;
use futures_util::stream::Stream;
use futures_util::{FutureExt, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

/// Raw response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = StreamResult<Vec<u8>>> + Send>>;

/// Opens one push-channel stream per call.
///
/// Dropping the returned stream closes the underlying transport.
pub trait EventTransport: Send + Sync + 'static {
    fn open(&self) -> BoxFuture<'_, StreamResult<ByteStream>>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}

/// Default TCP connect timeout for the event stream.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Server-sent-events stream over HTTP.
pub struct HttpEventTransport {
    client: Client,
    url: String,
}

impl HttpEventTransport {
    /// Create a transport for the given stream URL
    /// (e.g. `http://host:5000/api/events/stream`).
    pub fn new(url: impl Into<String>) -> StreamResult<Self> {
        // No overall request timeout: the body is an endless stream and
        // liveness is enforced by the heartbeat watchdog instead.
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StreamError::ConnectionFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Use an existing client (shared cookie store, custom TLS, ...).
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn open_stream(&self) -> StreamResult<ByteStream> {
        info!(url = %self.url, "Opening event stream");

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| StreamError::ConnectionFailed(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus(status.as_u16()));
        }
        debug!(%status, "Event stream response received");

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| StreamError::Transport(e.to_string()))
        });
        Ok(Box::pin(stream))
    }
}

impl EventTransport for HttpEventTransport {
    fn open(&self) -> BoxFuture<'_, StreamResult<ByteStream>> {
        self.open_stream().boxed()
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

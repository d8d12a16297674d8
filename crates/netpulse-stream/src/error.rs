//! Push-channel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream closed by server")]
    StreamClosed,

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Message parse error: {0}")]
    ParseError(String),
}

impl StreamError {
    /// Reconnect reason label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) | Self::HttpStatus(_) => "connect_failed",
            Self::Transport(_) => "transport_error",
            Self::StreamClosed => "stream_closed",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::ParseError(_) => "parse_error",
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        let cases = [
            (StreamError::ConnectionFailed("refused".into()), "connect_failed"),
            (StreamError::HttpStatus(503), "connect_failed"),
            (StreamError::Transport("reset".into()), "transport_error"),
            (StreamError::StreamClosed, "stream_closed"),
            (StreamError::HeartbeatTimeout, "heartbeat_timeout"),
            (StreamError::ParseError("alert_created: eof".into()), "parse_error"),
        ];
        for (err, reason) in cases {
            assert_eq!(err.reason(), reason, "{err}");
        }
    }
}

//! Mapping decoded SSE frames to stream messages.

use crate::error::{StreamError, StreamResult};
use crate::sse::SseFrame;
use netpulse_core::{EventKind, InboundEvent};
use serde::Deserialize;

/// Server control event sent once per stream.
const CONNECTED_EVENT: &str = "connected";

/// What a single frame means to the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Dashboard event to deduplicate and dispatch.
    Event(Box<InboundEvent>),
    /// Comment or unnamed frame; only rearms the heartbeat.
    KeepAlive,
    /// Server greeting at stream start.
    Connected { client_id: Option<String> },
    /// Named event this client does not handle.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct ConnectedBody {
    #[serde(default)]
    client_id: Option<String>,
}

/// Interpret one frame.
///
/// Returns `Err` only for known events whose body does not parse; callers
/// log and drop those without touching the connection.
pub fn parse_frame(frame: SseFrame) -> StreamResult<StreamMessage> {
    match frame {
        SseFrame::Comment(_) => Ok(StreamMessage::KeepAlive),
        SseFrame::Event { id, event, data } => {
            let name = match event.as_deref() {
                None | Some("") | Some("message") => return Ok(StreamMessage::KeepAlive),
                Some(name) => name,
            };

            if name == CONNECTED_EVENT {
                let client_id = serde_json::from_str::<ConnectedBody>(&data)
                    .ok()
                    .and_then(|body| body.client_id);
                return Ok(StreamMessage::Connected { client_id });
            }

            match EventKind::from_wire(name) {
                Some(kind) => InboundEvent::parse(kind, id.as_deref(), &data)
                    .map(|event| StreamMessage::Event(Box::new(event)))
                    .map_err(|e| StreamError::ParseError(format!("{name}: {e}"))),
                None => Ok(StreamMessage::Ignored(name.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_core::EventPayload;

    fn frame(event: Option<&str>, id: Option<&str>, data: &str) -> SseFrame {
        SseFrame::Event {
            id: id.map(str::to_string),
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_event_frame() {
        let msg = parse_frame(frame(
            Some("device_status"),
            Some("e1"),
            r#"{"event_id":"e1","event_type":"device_status","payload":{"new_status":"down"}}"#,
        ))
        .unwrap();

        match msg {
            StreamMessage::Event(event) => {
                assert_eq!(event.kind, EventKind::DeviceStatus);
                assert_eq!(event.event_id.as_deref(), Some("e1"));
                assert!(matches!(event.payload, EventPayload::DeviceStatus(_)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_keep_alives() {
        assert_eq!(
            parse_frame(SseFrame::Comment("keep-alive".to_string())).unwrap(),
            StreamMessage::KeepAlive
        );
        assert_eq!(
            parse_frame(frame(None, None, "ping")).unwrap(),
            StreamMessage::KeepAlive
        );
    }

    #[test]
    fn test_connected_greeting() {
        let msg = parse_frame(frame(
            Some("connected"),
            None,
            r#"{"client_id": "ab12cd34", "status": "connected"}"#,
        ))
        .unwrap();
        assert_eq!(
            msg,
            StreamMessage::Connected {
                client_id: Some("ab12cd34".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert_eq!(
            parse_frame(frame(Some("scan_finished"), None, "{}")).unwrap(),
            StreamMessage::Ignored("scan_finished".to_string())
        );
    }

    #[test]
    fn test_malformed_payload_is_error() {
        let result = parse_frame(frame(Some("alert_created"), None, "{oops"));
        assert!(matches!(result, Err(StreamError::ParseError(_))));
    }
}

//! Gateway frame shapes
//!
//! Every frame is one JSON object discriminated by its `type` field:
//! - `event`: server-pushed event `{type, event, payload?}`
//! - `req`: correlated request `{type, id, method, params?}`
//! - `res`: correlated response `{type, id, ok, payload?, error?}`
//!
//! Objects with any other `type` are kept verbatim as `Unrecognized` so they
//! can be logged and re-emitted unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ErrorShape;
use crate::request_id::RequestId;

/// A single frame on the gateway channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    /// Asynchronous event
    #[serde(rename = "event")]
    Event {
        /// Event name (e.g. `connect.challenge`)
        event: String,
        /// Event payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// Request expecting a correlated response
    #[serde(rename = "req")]
    Request {
        /// Correlation id
        id: RequestId,
        /// Method name
        method: String,
        /// Method parameters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },

    /// Response to an earlier request
    #[serde(rename = "res")]
    Response {
        /// Correlation id echoed from the request
        id: RequestId,
        /// Whether the request succeeded
        ok: bool,
        /// Success payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        /// Failure details
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorShape>,
    },

    /// A JSON object with an unknown `type`, kept as received
    #[serde(skip)]
    Unrecognized {
        /// The raw frame text
        raw: String,
    },
}

/// Wire discriminator of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `event`
    Event,
    /// `req`
    Request,
    /// `res`
    Response,
}

impl FrameKind {
    /// The `type` string used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Event => "event",
            FrameKind::Request => "req",
            FrameKind::Response => "res",
        }
    }

    /// Parse a wire `type` string
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "event" => Some(Self::Event),
            "req" => Some(Self::Request),
            "res" => Some(Self::Response),
            _ => None,
        }
    }
}

impl GatewayFrame {
    /// Get the wire kind of this frame (`None` for unrecognized frames)
    pub fn kind(&self) -> Option<FrameKind> {
        match self {
            GatewayFrame::Event { .. } => Some(FrameKind::Event),
            GatewayFrame::Request { .. } => Some(FrameKind::Request),
            GatewayFrame::Response { .. } => Some(FrameKind::Response),
            GatewayFrame::Unrecognized { .. } => None,
        }
    }

    /// Short label for logging (`event connect.challenge`, `res req_..`)
    pub fn label(&self) -> String {
        match self {
            GatewayFrame::Event { event, .. } => format!("event {}", event),
            GatewayFrame::Request { id, method, .. } => format!("req {} ({})", method, id),
            GatewayFrame::Response { id, ok, .. } => format!("res {} ok={}", id, ok),
            GatewayFrame::Unrecognized { .. } => "unrecognized".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_roundtrip() {
        for kind in [FrameKind::Event, FrameKind::Request, FrameKind::Response] {
            assert_eq!(FrameKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(FrameKind::from_wire("ping"), None);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let frame = GatewayFrame::Event {
            event: "tick".to_string(),
            payload: None,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, serde_json::json!({"type": "event", "event": "tick"}));
    }

    #[test]
    fn test_response_without_payload_deserializes() {
        let frame: GatewayFrame =
            serde_json::from_str(r#"{"type":"res","id":"req_1","ok":false}"#).unwrap();
        assert_eq!(
            frame,
            GatewayFrame::Response {
                id: RequestId::new("req_1"),
                ok: false,
                payload: None,
                error: None,
            }
        );
        assert_eq!(frame.kind(), Some(FrameKind::Response));
    }

    #[test]
    fn test_label() {
        let frame = GatewayFrame::Request {
            id: RequestId::new("req_9"),
            method: "connect".to_string(),
            params: None,
        };
        assert_eq!(frame.label(), "req connect (req_9)");
    }
}

//! Frame encoding, decoding and classification
//!
//! `encode`/`decode` map between [`GatewayFrame`] and its JSON text.
//! `classify` lifts decoded frames into the shapes the handshake cares
//! about. [`JsonLinesCodec`] frames JSON texts on a byte stream, one per line.

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameKind, GatewayFrame};
use crate::message::{Challenge, ErrorShape, CHALLENGE_EVENT};
use crate::request_id::RequestId;

/// Maximum length of a single frame on a line-delimited stream (1 MiB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Decode one frame from its JSON text.
///
/// Malformed input is reported as an error, never a panic. A JSON object
/// whose `type` is not `event`, `req` or `res` decodes to
/// [`GatewayFrame::Unrecognized`].
pub fn decode(raw: &str) -> Result<GatewayFrame, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    match FrameKind::from_wire(kind) {
        Some(kind) => {
            serde_json::from_value(value).map_err(|e| ProtocolError::MalformedFrame {
                kind: kind.as_str(),
                reason: e.to_string(),
            })
        }
        None => Ok(GatewayFrame::Unrecognized {
            raw: raw.to_string(),
        }),
    }
}

/// Encode one frame into its JSON text
pub fn encode(frame: &GatewayFrame) -> Result<String, ProtocolError> {
    match frame {
        GatewayFrame::Unrecognized { raw } => Ok(raw.clone()),
        _ => Ok(serde_json::to_string(frame)?),
    }
}

/// A decoded frame as seen by the handshake
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The server-issued `connect.challenge` event
    Challenge(Challenge),
    /// Any other event, passed through opaquely
    Event {
        /// Event name
        name: String,
        /// Event payload
        payload: Option<Value>,
    },
    /// A response to a request
    Response {
        /// Correlation id
        id: RequestId,
        /// Success flag
        ok: bool,
        /// Success payload
        payload: Option<Value>,
        /// Failure details
        error: Option<ErrorShape>,
    },
    /// A server-initiated request (not used during the handshake)
    Request {
        /// Correlation id
        id: RequestId,
        /// Method name
        method: String,
    },
    /// A frame with an unknown `type`
    Unrecognized {
        /// The raw frame text
        raw: String,
    },
}

/// Lift a decoded frame into an [`Inbound`] message.
///
/// Only `connect.challenge` events are inspected; a challenge without a
/// string `nonce` and an integer `ts` is a [`ProtocolError::MalformedChallenge`].
pub fn classify(frame: GatewayFrame) -> Result<Inbound, ProtocolError> {
    match frame {
        GatewayFrame::Event { event, payload } if event == CHALLENGE_EVENT => {
            let payload = payload
                .ok_or_else(|| ProtocolError::MalformedChallenge("missing payload".to_string()))?;
            let challenge: Challenge = serde_json::from_value(payload)
                .map_err(|e| ProtocolError::MalformedChallenge(e.to_string()))?;
            Ok(Inbound::Challenge(challenge))
        }
        GatewayFrame::Event { event, payload } => Ok(Inbound::Event {
            name: event,
            payload,
        }),
        GatewayFrame::Response {
            id,
            ok,
            payload,
            error,
        } => Ok(Inbound::Response {
            id,
            ok,
            payload,
            error,
        }),
        GatewayFrame::Request { id, method, .. } => Ok(Inbound::Request { id, method }),
        GatewayFrame::Unrecognized { raw } => Ok(Inbound::Unrecognized { raw }),
    }
}

/// Decode and classify in one step
pub fn decode_inbound(raw: &str) -> Result<Inbound, ProtocolError> {
    classify(decode(raw)?)
}

/// Read a framed line as JSON text.
///
/// Invalid UTF-8 is a per-frame decode error; the stream it came from stays
/// usable.
pub fn line_text(line: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

/// Codec for newline-delimited JSON frames
///
/// Decoding yields each line as raw bytes (trailing `\r` removed, blank
/// lines skipped) and leaves text validation to [`line_text`], so one
/// unreadable line never terminates the stream.
#[derive(Debug)]
pub struct JsonLinesCodec {
    /// Maximum accepted line length in bytes
    max_length: usize,
    /// Bytes already scanned for a newline
    next_index: usize,
}

impl Default for JsonLinesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonLinesCodec {
    /// Create a new codec with the default maximum frame length
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_LEN)
    }

    /// Create a new codec with a custom maximum frame length
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Get the maximum frame length
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn take_line(&mut self, src: &mut BytesMut, len: usize, consume: usize) -> BytesMut {
        let mut line = src.split_to(consume);
        self.next_index = 0;
        line.truncate(len);
        if line.last() == Some(&b'\r') {
            line.truncate(len - 1);
        }
        line
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

impl Decoder for JsonLinesCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                // No complete line yet
                if src.len() > self.max_length {
                    return Err(ProtocolError::FrameTooLong {
                        size: src.len(),
                        max: self.max_length,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let len = self.next_index + offset;
            if len > self.max_length {
                return Err(ProtocolError::FrameTooLong {
                    size: len,
                    max: self.max_length,
                });
            }

            let line = self.take_line(src, len, len + 1);
            // Blank lines are keepalives, not frames
            if is_blank(&line) {
                continue;
            }
            return Ok(Some(line));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Unterminated final line
        let len = src.len();
        let line = self.take_line(src, len, len);
        if is_blank(&line) {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}

impl Encoder<String> for JsonLinesCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_length {
            return Err(ProtocolError::FrameTooLong {
                size: item.len(),
                max: self.max_length,
            });
        }
        if item.contains('\n') {
            return Err(ProtocolError::MalformedFrame {
                kind: "line",
                reason: "embedded newline".to_string(),
            });
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

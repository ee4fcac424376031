//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding gateway frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Frame is valid JSON but not a JSON object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// Frame object has no string `type` field
    #[error("Frame has no `type` field")]
    MissingType,

    /// Frame has a known `type` but its fields do not match that shape
    #[error("Malformed `{kind}` frame: {reason}")]
    MalformedFrame { kind: &'static str, reason: String },

    /// A `connect.challenge` event without a usable nonce/timestamp
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(String),

    /// Line exceeds the maximum frame length
    #[error("Frame too long: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLong { size: usize, max: usize },

    /// Frame bytes are not valid UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

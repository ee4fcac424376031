//! Handshake failure taxonomy

use std::fmt;

use gc_core::{CryptoError, TransportError};
use serde::Serialize;
use thiserror::Error;

/// Why a handshake attempt failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandshakeError {
    /// Connect, send or receive failed, or the peer closed the connection
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame from the gateway could not be decoded, and nothing else
    /// resolved the attempt
    #[error("Undecodable frame from gateway: {0}")]
    Decode(String),

    /// The connect request could not be serialized
    #[error("Failed to build connect request: {0}")]
    Encode(String),

    /// Key generation or signing failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The gateway answered the connect request with `ok: false`
    #[error(
        "Gateway rejected connect: {}",
        rejection_text(.code.as_deref(), .message.as_deref())
    )]
    Rejected {
        /// Server error code, verbatim
        code: Option<String>,
        /// Server error message, verbatim
        message: Option<String>,
    },

    /// The gateway settled on a protocol version outside the accepted range
    #[error("Gateway protocol {reported} is outside the accepted range {min}..={max}")]
    VersionMismatch {
        /// Version reported in `hello-ok`
        reported: u32,
        /// Lowest accepted version
        min: u32,
        /// Highest accepted version
        max: u32,
    },

    /// `ok: true` but the payload is not a usable `hello-ok`
    #[error("Malformed hello-ok: {0}")]
    MalformedSuccess(String),

    /// No qualifying frame arrived within the handshake bound
    #[error("Timed out waiting for the gateway")]
    Timeout,

    /// The attempt was cancelled by the caller
    #[error("Handshake cancelled")]
    Cancelled,
}

fn rejection_text(code: Option<&str>, message: Option<&str>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => "no reason given".to_string(),
    }
}

impl HandshakeError {
    /// Short stable identifier, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeError::Transport(_) => "transport",
            HandshakeError::Decode(_) => "decode",
            HandshakeError::Encode(_) => "encode",
            HandshakeError::Crypto(_) => "crypto",
            HandshakeError::Rejected { .. } => "rejected",
            HandshakeError::VersionMismatch { .. } => "version_mismatch",
            HandshakeError::MalformedSuccess(_) => "malformed_success",
            HandshakeError::Timeout => "timeout",
            HandshakeError::Cancelled => "cancelled",
        }
    }

    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Rejections, protocol mismatches, request encoding and crypto failures
    /// are deterministic and are not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandshakeError::Transport(_) | HandshakeError::Decode(_) | HandshakeError::Timeout
        )
    }
}

/// Where in the attempt a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStage {
    /// Opening the transport
    Connect,
    /// Connected, no challenge consumed yet
    AwaitingChallenge,
    /// Connect request sent, waiting for its response
    AwaitingResponse,
}

impl HandshakeStage {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStage::Connect => "connect",
            HandshakeStage::AwaitingChallenge => "awaiting_challenge",
            HandshakeStage::AwaitingResponse => "awaiting_response",
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Terminal result of a handshake attempt

use std::fmt;
use std::time::Duration;

use gc_core::DeviceInfo;
use serde_json::Value;

use super::error::{HandshakeError, HandshakeStage};

/// Session parameters granted by a successful handshake
#[derive(Clone, PartialEq)]
pub struct HelloOk {
    /// Protocol version the gateway settled on
    pub protocol_version: u32,
    /// Session-scoped device token
    pub device_token: String,
    /// Policy object, if the gateway sent one
    pub policy: Option<Value>,
}

impl fmt::Debug for HelloOk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelloOk")
            .field("protocol_version", &self.protocol_version)
            .field("device_token", &format_args!("<{} chars>", self.device_token.len()))
            .field("policy", &self.policy)
            .finish()
    }
}

/// A failed attempt: what went wrong and where
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeFailure {
    /// The failure reason
    pub error: HandshakeError,
    /// The stage the attempt was in when it failed
    pub stage: HandshakeStage,
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (stage: {})", self.error, self.stage)
    }
}

/// The single terminal outcome of an attempt
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeOutcome {
    /// The gateway accepted the connect request
    Succeeded(HelloOk),
    /// The attempt failed
    Failed(HandshakeFailure),
}

impl HandshakeOutcome {
    /// Build a failed outcome
    pub fn failed(error: HandshakeError, stage: HandshakeStage) -> Self {
        HandshakeOutcome::Failed(HandshakeFailure { error, stage })
    }

    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, HandshakeOutcome::Succeeded(_))
    }

    /// The granted session, if any
    pub fn hello(&self) -> Option<&HelloOk> {
        match self {
            HandshakeOutcome::Succeeded(hello) => Some(hello),
            HandshakeOutcome::Failed(_) => None,
        }
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&HandshakeFailure> {
        match self {
            HandshakeOutcome::Succeeded(_) => None,
            HandshakeOutcome::Failed(failure) => Some(failure),
        }
    }

    /// The granted device token, if any
    pub fn device_token(&self) -> Option<&str> {
        self.hello().map(|hello| hello.device_token.as_str())
    }
}

/// Everything a caller learns from one attempt
#[derive(Debug, Clone)]
pub struct AttemptReport {
    /// Terminal outcome
    pub outcome: HandshakeOutcome,
    /// Wall time from start to outcome
    pub elapsed: Duration,
    /// The device identity used, if device auth was enabled
    pub device: Option<DeviceInfo>,
    /// Description of the remote end
    pub peer: String,
    /// Frames received and discarded (duplicates, foreign ids, undecodable)
    pub ignored_frames: usize,
}

impl AttemptReport {
    /// Report for an attempt that never got as far as opening the transport
    pub fn not_started(peer: impl Into<String>, error: HandshakeError) -> Self {
        Self {
            outcome: HandshakeOutcome::failed(error, HandshakeStage::Connect),
            elapsed: Duration::ZERO,
            device: None,
            peer: peer.into(),
            ignored_frames: 0,
        }
    }
}

//! Core error types for gatecheck

use gc_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the gatecheck crates
#[derive(Error, Debug)]
pub enum GcError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Cryptography error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level errors (connect, send, close)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Connection attempt did not finish in time
    #[error("Connection to {address} timed out")]
    ConnectTimeout { address: String },

    /// Operation on a transport that is not open
    #[error("Transport is not open")]
    NotOpen,

    /// Failed to write a frame
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to read from the connection
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    Closed,

    /// Failed to shut the connection down cleanly
    #[error("Close failed: {0}")]
    CloseFailed(String),
}

/// Key generation, signing and verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The system entropy source failed
    #[error("Entropy source failed: {0}")]
    Entropy(String),

    /// Public key could not be encoded
    #[error("Failed to encode public key: {0}")]
    KeyEncoding(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Public key could not be decoded
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature could not be decoded
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// Signature does not match the signed payload
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Assertion does not echo the challenge it claims to answer
    #[error("Assertion does not match challenge: {0}")]
    ChallengeMismatch(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

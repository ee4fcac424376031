//! Typed payloads for the gateway connect handshake
//!
//! The frames in `frame.rs` carry their payloads as raw JSON values; this
//! module defines the shapes the handshake actually reads and writes.
//!
//! # Message Flow
//!
//! 1. Client opens the transport
//! 2. Gateway sends a `connect.challenge` event carrying `{nonce, ts}`
//! 3. Client signs `"{nonce}:{ts}:{deviceId}"` and sends a `connect` request
//! 4. Gateway answers with a `res` frame: `hello-ok` with a device token, or
//!    `ok: false` with an error
//!
//! Everything exchanged after `hello-ok` is outside this crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current protocol version spoken by this client.
pub const PROTOCOL_VERSION: u32 = 3;

/// Event name of the server-issued challenge
pub const CHALLENGE_EVENT: &str = "connect.challenge";

/// Method name of the connect request
pub const CONNECT_METHOD: &str = "connect";

/// Payload `type` of a successful connect response
pub const HELLO_OK: &str = "hello-ok";

/// Server-issued challenge that must be signed before authentication proceeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Server-chosen nonce, used verbatim
    pub nonce: String,
    /// Server timestamp in milliseconds
    #[serde(rename = "ts")]
    pub issued_at: u64,
}

/// Client descriptor sent in the connect request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identifier (e.g. "cli")
    pub id: String,
    /// Client version
    pub version: String,
    /// Platform name (e.g. "linux", "windows")
    pub platform: String,
    /// Client mode (e.g. "cli", "operator")
    pub mode: String,
}

/// Bearer credential block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    /// Gateway token
    pub token: String,
}

/// Signed device-identity assertion bound to one challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAssertion {
    /// Device identifier
    pub id: String,
    /// Base64 SubjectPublicKeyInfo DER, no PEM armor
    pub public_key: String,
    /// Base64 DER ECDSA signature over the canonical challenge string
    pub signature: String,
    /// Echo of the challenge timestamp
    pub signed_at: u64,
    /// Echo of the challenge nonce
    pub nonce: String,
}

/// Parameters of the `connect` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol version the client accepts
    pub min_protocol: u32,
    /// Highest protocol version the client accepts
    pub max_protocol: u32,
    /// Client descriptor
    pub client: ClientInfo,
    /// Requested role
    pub role: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Advertised capabilities
    #[serde(default)]
    pub caps: Vec<String>,
    /// Advertised commands
    #[serde(default)]
    pub commands: Vec<String>,
    /// Requested permissions
    #[serde(default)]
    pub permissions: Map<String, Value>,
    /// Bearer credential
    pub auth: AuthParams,
    /// Client locale
    pub locale: String,
    /// User agent string
    pub user_agent: String,
    /// Signed device identity (omitted for token-only connects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceAssertion>,
}

/// Protocol version as reported by the gateway.
///
/// Gateways have been seen sending both `"3"` and `3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolField {
    /// Numeric form
    Number(u64),
    /// String form
    Text(String),
}

impl ProtocolField {
    /// Parse into a version number, if it is one
    pub fn as_version(&self) -> Option<u32> {
        match self {
            ProtocolField::Number(n) => u32::try_from(*n).ok(),
            ProtocolField::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for ProtocolField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolField::Number(n) => write!(f, "{}", n),
            ProtocolField::Text(s) => write!(f, "{}", s),
        }
    }
}

/// `auth` block of a `hello-ok` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloAuth {
    /// Session credential for all subsequent traffic
    #[serde(default)]
    pub device_token: Option<String>,
}

/// Payload of a connect response.
///
/// Every field is optional so that a malformed success can be reported
/// precisely instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Payload type, `hello-ok` on success
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Negotiated protocol version
    #[serde(default)]
    pub protocol: Option<ProtocolField>,
    /// Credential block
    #[serde(default)]
    pub auth: Option<HelloAuth>,
    /// Server policy object, passed through opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

impl HelloPayload {
    /// Whether the payload announces a successful handshake
    pub fn is_hello_ok(&self) -> bool {
        self.kind.as_deref() == Some(HELLO_OK)
    }

    /// The device token, if present and non-empty
    pub fn device_token(&self) -> Option<&str> {
        self.auth
            .as_ref()
            .and_then(|a| a.device_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Error block of a failed response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    /// Machine-readable code (e.g. "AUTH_INVALID")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{}: {}", code, message),
            (Some(code), None) => write!(f, "{}", code),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use gc_protocol::{ClientInfo, PROTOCOL_VERSION};

use super::backoff::BackoffConfig;
use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::types::Endpoint;

/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Configuration for one gateway check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatecheckConfig {
    /// Gateway address and credential
    pub gateway: GatewayConfig,

    /// Client descriptor and requested access
    pub client: ClientConfig,

    /// Accepted protocol version range
    pub protocol: ProtocolRange,

    /// Handshake behaviour
    pub handshake: HandshakeConfig,

    /// TCP reachability probe
    pub probe: ProbeConfig,

    /// SSH tunnel mode
    pub tunnel: TunnelConfig,

    /// Backoff between whole-attempt retries
    pub retry: BackoffConfig,
}

/// Gateway address and bearer credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway host.
    ///
    /// In tunnel mode this is the local end of the forward (usually
    /// `127.0.0.1`).
    pub host: String,

    /// Gateway port
    pub port: u16,

    /// Bearer token presented in the connect request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            token: None,
        }
    }
}

impl GatewayConfig {
    /// Get the gateway endpoint
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Get the bearer token, failing if none is configured
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ConfigError::MissingField("gateway.token".to_string())),
        }
    }

    /// Token with all but the first few characters masked, for display
    pub fn masked_token(&self) -> Option<String> {
        self.token.as_deref().map(|token| {
            let visible: String = token.chars().take(6).collect();
            if token.chars().count() > 6 {
                format!("{}...", visible)
            } else {
                "***".to_string()
            }
        })
    }
}

/// Client descriptor, requested role and scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client identifier
    pub id: String,

    /// Client version
    pub version: String,

    /// Platform name
    pub platform: String,

    /// Client mode
    pub mode: String,

    /// Requested role
    pub role: String,

    /// Requested scopes
    pub scopes: Vec<String>,

    /// Locale sent to the gateway
    pub locale: String,

    /// User agent (defaults to `{id}/{version}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: "cli".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            mode: "cli".to_string(),
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string(), "operator.write".to_string()],
            locale: "en-US".to_string(),
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Client descriptor for the connect request
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id.clone(),
            version: self.version.clone(),
            platform: self.platform.clone(),
            mode: self.mode.clone(),
        }
    }

    /// User agent, falling back to `{id}/{version}`
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.id, self.version))
    }
}

/// Inclusive protocol version bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolRange {
    /// Lowest accepted version
    pub min: u32,
    /// Highest accepted version
    pub max: u32,
}

impl Default for ProtocolRange {
    fn default() -> Self {
        Self {
            min: PROTOCOL_VERSION,
            max: PROTOCOL_VERSION,
        }
    }
}

impl ProtocolRange {
    /// Whether `version` lies within the range
    pub fn contains(&self, version: u32) -> bool {
        self.min <= version && version <= self.max
    }
}

/// Handshake behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Bound on the whole handshake (challenge plus response)
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Attach a signed device identity to the connect request
    pub device_auth: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            device_auth: true,
        }
    }
}

/// TCP reachability probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Connect timeout for the probe
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// SSH tunnel mode.
///
/// Gateways that bind only to loopback are reached through a local port
/// forward (`ssh -N -L <port>:127.0.0.1:<remote_port> user@host`). In this
/// mode the check first verifies that the forward is listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Whether tunnel mode is enabled
    pub enabled: bool,

    /// SSH server that hosts the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,

    /// SSH login user
    pub ssh_user: String,

    /// Gateway port on the remote side of the tunnel
    pub remote_port: u16,

    /// Timeout for the local forward check
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssh_host: None,
            ssh_user: "root".to_string(),
            remote_port: DEFAULT_GATEWAY_PORT,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

impl TunnelConfig {
    /// The `ssh` command that establishes the forward for `local_port`
    pub fn ssh_command(&self, local_port: u16) -> Option<String> {
        self.ssh_host.as_ref().map(|host| {
            format!(
                "ssh -N -L {}:127.0.0.1:{} {}@{}",
                local_port, self.remote_port, self.ssh_user, host
            )
        })
    }
}

impl GatecheckConfig {
    /// Check the configuration for values that can never work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.host.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.host is empty".to_string()));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::Invalid("gateway.port must be non-zero".to_string()));
        }
        if self.protocol.min > self.protocol.max {
            return Err(ConfigError::Invalid(format!(
                "protocol.min ({}) is greater than protocol.max ({})",
                self.protocol.min, self.protocol.max
            )));
        }
        if self.handshake.timeout.is_zero() {
            return Err(ConfigError::Invalid("handshake.timeout must be non-zero".to_string()));
        }
        if self.probe.timeout.is_zero() {
            return Err(ConfigError::Invalid("probe.timeout must be non-zero".to_string()));
        }
        if self.tunnel.enabled && self.tunnel.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "tunnel.probe_timeout must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.jitter must be in 0..=1 and retry.multiplier >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

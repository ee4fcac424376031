//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A host/port pair the client connects to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address string suitable for `TcpStream::connect`.
    ///
    /// IPv6 literals are bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether the host is a loopback name or address
    pub fn is_loopback(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1" | "[::1]")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Shareable description of a device identity (never includes key material)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device identifier
    pub id: String,
    /// Public key fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_address() {
        assert_eq!(Endpoint::new("example.com", 18789).address(), "example.com:18789");
        assert_eq!(Endpoint::new("::1", 80).address(), "[::1]:80");
        assert_eq!(Endpoint::new("[::1]", 80).address(), "[::1]:80");
    }

    #[test]
    fn test_endpoint_loopback() {
        assert!(Endpoint::new("localhost", 1).is_loopback());
        assert!(Endpoint::new("127.0.0.1", 1).is_loopback());
        assert!(!Endpoint::new("10.0.0.1", 1).is_loopback());
    }

    #[test]
    fn test_device_info_serialization() {
        let info = DeviceInfo {
            id: "device_01".to_string(),
            fingerprint: None,
        };
        assert_eq!(serde_json::to_string(&info).unwrap(), r#"{"id":"device_01"}"#);
    }
}

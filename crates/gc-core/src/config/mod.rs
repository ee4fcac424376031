//! Configuration management for gatecheck

mod backoff;
mod gatecheck;
pub mod serde_utils;

pub use backoff::BackoffConfig;
pub use gatecheck::{
    ClientConfig, GatecheckConfig, GatewayConfig, HandshakeConfig, ProbeConfig, ProtocolRange,
    TunnelConfig, DEFAULT_GATEWAY_PORT,
};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable that supplies the gateway token
pub const TOKEN_ENV_VAR: &str = "GATECHECK_TOKEN";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatecheck")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the configuration at `path`, or defaults if the file does not exist
pub fn load_or_default(path: &Path) -> Result<GatecheckConfig, ConfigError> {
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(GatecheckConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    // The file may hold the gateway token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| ConfigError::Invalid(format!("Failed to set permissions: {}", e)))?;
    }

    Ok(())
}

//! CLI command implementations

mod check;
mod config;
mod handshake;

pub use check::{
    check_command, planned_stages, run_stages, suggestions, StageRun, STAGE_HANDSHAKE,
    STAGE_REACHABILITY, STAGE_TRANSPORT, STAGE_TUNNEL,
};
pub use config::{config_init, config_path, config_show};
pub use handshake::handshake_command;

use anyhow::{Context, Result};

use gc_client::ConnectTemplate;
use gc_core::config::{GatecheckConfig, TOKEN_ENV_VAR};
use gc_core::ConfigError;

/// Build the connect template, explaining how to supply a missing token
pub(crate) fn connect_template(config: &GatecheckConfig) -> Result<ConnectTemplate> {
    match ConnectTemplate::from_config(config) {
        Ok(template) => Ok(template),
        Err(ConfigError::MissingField(field)) => Err(anyhow::anyhow!(
            "No gateway token configured ({}): pass --token or set {}",
            field,
            TOKEN_ENV_VAR
        )),
        Err(e) => Err(e).context("Invalid connect settings"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_mentions_env_var() {
        let err = connect_template(&GatecheckConfig::default()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("--token"));
        assert!(text.contains("GATECHECK_TOKEN"));
    }

    #[test]
    fn test_inverted_protocol_range_is_rejected() {
        let mut config = GatecheckConfig::default();
        config.gateway.token = Some("tok".to_string());
        config.protocol.min = 4;
        config.protocol.max = 3;
        assert!(connect_template(&config).is_err());
    }
}

//! Connect request template

use gc_core::config::{GatecheckConfig, ProtocolRange};
use gc_core::ConfigError;
use gc_protocol::{AuthParams, ClientInfo, ConnectParams, DeviceAssertion};
use serde_json::Map;

/// Everything in a connect request except the per-challenge device block.
///
/// One template serves every attempt against a gateway; the machine fills
/// in the signed assertion when the challenge arrives.
#[derive(Clone, PartialEq)]
pub struct ConnectTemplate {
    /// Client descriptor
    pub client: ClientInfo,
    /// Requested role
    pub role: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Bearer token
    pub token: String,
    /// Accepted protocol versions
    pub protocol: ProtocolRange,
    /// Locale
    pub locale: String,
    /// User agent
    pub user_agent: String,
}

impl ConnectTemplate {
    /// Template with operator defaults for the given token and client
    pub fn new(token: impl Into<String>, client: ClientInfo) -> Self {
        let user_agent = format!("{}/{}", client.id, client.version);
        Self {
            client,
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string(), "operator.write".to_string()],
            token: token.into(),
            protocol: ProtocolRange::default(),
            locale: "en-US".to_string(),
            user_agent,
        }
    }

    /// Build the template from configuration.
    ///
    /// Fails when no token is configured or the protocol range is inverted.
    pub fn from_config(config: &GatecheckConfig) -> Result<Self, ConfigError> {
        let token = config.gateway.require_token()?.to_string();
        let template = Self {
            client: config.client.client_info(),
            role: config.client.role.clone(),
            scopes: config.client.scopes.clone(),
            token,
            protocol: config.protocol,
            locale: config.client.locale.clone(),
            user_agent: config.client.user_agent(),
        };
        template.validate()?;
        Ok(template)
    }

    /// Check the template before any request is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.min > self.protocol.max {
            return Err(ConfigError::Invalid(format!(
                "minProtocol {} exceeds maxProtocol {}",
                self.protocol.min, self.protocol.max
            )));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingField("gateway.token".to_string()));
        }
        Ok(())
    }

    /// Fill in the connect parameters, with or without a device block
    pub fn build(&self, device: Option<DeviceAssertion>) -> ConnectParams {
        ConnectParams {
            min_protocol: self.protocol.min,
            max_protocol: self.protocol.max,
            client: self.client.clone(),
            role: self.role.clone(),
            scopes: self.scopes.clone(),
            caps: Vec::new(),
            commands: Vec::new(),
            permissions: Map::new(),
            auth: AuthParams {
                token: self.token.clone(),
            },
            locale: self.locale.clone(),
            user_agent: self.user_agent.clone(),
            device,
        }
    }
}

impl std::fmt::Debug for ConnectTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectTemplate")
            .field("client", &self.client)
            .field("role", &self.role)
            .field("scopes", &self.scopes)
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

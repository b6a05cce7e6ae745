use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level settings for the connection orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Value written to the connect-mode flag after a successful connect.
    pub connect_mode_label: String,
    /// UI mode selected on connect and on disconnect.
    pub ui_mode: String,
    pub refresh_policy: RefreshPolicy,
    pub notices: NoticeConfig,
    /// Networks offered to the wallet when it does not know a chain.
    pub networks: Vec<NetworkConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            connect_mode_label: "metamask".to_string(),
            ui_mode: "wallet".to_string(),
            refresh_policy: RefreshPolicy::default(),
            notices: NoticeConfig::default(),
            networks: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_mode_label.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "connect_mode_label".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.ui_mode.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ui_mode".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for network in &self.networks {
            network.validate()?;
            if !seen.insert(network.chain_id) {
                return Err(ConfigError::DuplicateNetwork {
                    chain_id: network.chain_id,
                });
            }
        }
        Ok(())
    }
}

/// How overlapping account refreshes are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Every completed refresh publishes, in completion order.
    #[default]
    LastWriteWins,
    /// A refresh publishes only if no newer refresh was started meanwhile.
    LatestOnly,
}

/// Text of a user-facing dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub action_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// Shown when the user rejects the connection request.
    pub connect_rejected: Notice,
    /// Shown when the wallet already has a chain switch waiting for the user.
    pub request_pending: Notice,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            connect_rejected: Notice {
                title: "Error connecting".to_string(),
                message: "The connection request was rejected. Please try again.".to_string(),
                action_label: "Retry".to_string(),
            },
            request_pending: Notice {
                title: "Request pending".to_string(),
                message: "Please open your wallet and confirm the pending network switch."
                    .to_string(),
                action_label: "OK".to_string(),
            },
        }
    }
}

/// A network the wallet can be asked to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
}

impl NetworkConfig {
    pub fn new(chain_id: u64, name: &str, rpc_url: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            rpc_urls: vec![rpc_url.to_string()],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("networks[{}].name", self.chain_id),
            });
        }
        if self.rpc_urls.is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("networks[{}].rpc_urls", self.chain_id),
            });
        }
        for url in &self.rpc_urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: format!("networks[{}].rpc_urls", self.chain_id),
                    reason: format!("'{}' is not an http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.connect_mode_label, "metamask");
        assert_eq!(config.ui_mode, "wallet");
        assert_eq!(config.refresh_policy, RefreshPolicy::LastWriteWins);
        assert_eq!(config.notices.connect_rejected.title, "Error connecting");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let config = OrchestratorConfig {
            networks: vec![
                NetworkConfig::new(137, "Polygon", "https://polygon-rpc.com"),
                NetworkConfig::new(137, "Polygon Again", "https://polygon-rpc.com"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateNetwork { chain_id: 137 })
        ));
    }

    #[test]
    fn test_network_without_rpc_rejected() {
        let network = NetworkConfig {
            chain_id: 10,
            name: "Optimism".to_string(),
            rpc_urls: vec![],
        };
        assert!(matches!(
            network.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let raw = r#"{ "refresh_policy": "latest_only" }"#;
        let config: OrchestratorConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.refresh_policy, RefreshPolicy::LatestOnly);
        assert_eq!(config.connect_mode_label, "metamask");
    }
}

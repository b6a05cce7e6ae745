use ::config::{Config, Environment, File, FileFormat};
use anyhow::{Context, Result};
use connect_core::{ConfigError, NetworkConfig, OrchestratorConfig};
use ethers::types::Address;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Chain the wallet is on at startup.
    pub chain_id: u64,
    /// Addresses exposed through `eth_requestAccounts`, first one selected.
    pub accounts: Vec<String>,
    /// Approve connection and add-chain requests without prompting.
    #[serde(default)]
    pub auto_approve: bool,
    /// Networks the wallet knows before any `wallet_addEthereumChain`.
    pub chains: Vec<NetworkConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl WalletConfig {
    /// Load from `path`, then apply `EVM_WALLET_*` environment overrides
    /// (e.g. `EVM_WALLET_AUTO_APPROVE=true`, `EVM_WALLET_ACCOUNTS=0x..,0x..`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("EVM_WALLET")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("accounts"),
            )
            .build()
            .with_context(|| format!("Failed to read config '{}'", path))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::MissingField {
                field: "accounts".to_string(),
            });
        }
        for account in &self.accounts {
            if account.parse::<Address>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "accounts".to_string(),
                    reason: format!("'{}' is not an address", account),
                });
            }
        }

        for chain in &self.chains {
            chain.validate()?;
        }
        if !self.chains.iter().any(|c| c.chain_id == self.chain_id) {
            return Err(ConfigError::InvalidValue {
                field: "chain_id".to_string(),
                reason: format!("chain {} is not listed in chains", self.chain_id),
            });
        }

        self.orchestrator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect_core::RefreshPolicy;

    const BASE: &str = r#"
        chain_id = 1
        accounts = ["0x8ba1f109551bD432803012645Ac136ddd64DBA72"]

        [[chains]]
        chain_id = 1
        name = "Ethereum"
        rpc_urls = ["https://eth.llamarpc.com"]
    "#;

    #[test]
    fn test_minimal_config() {
        let config = WalletConfig::from_toml(BASE).unwrap();

        assert_eq!(config.chain_id, 1);
        assert!(!config.auto_approve);
        assert_eq!(config.chains[0].name, "Ethereum");
        assert_eq!(config.orchestrator.connect_mode_label, "metamask");
    }

    #[test]
    fn test_orchestrator_section() {
        let raw = format!(
            "auto_approve = true\n{}\n[orchestrator]\nrefresh_policy = \"latest_only\"\n",
            BASE
        );

        let config = WalletConfig::from_toml(&raw).unwrap();

        assert!(config.auto_approve);
        assert_eq!(config.orchestrator.refresh_policy, RefreshPolicy::LatestOnly);
    }

    #[test]
    fn test_active_chain_must_be_known() {
        let raw = BASE.replacen("chain_id = 1", "chain_id = 137", 1);

        let err = WalletConfig::from_toml(&raw).unwrap_err();

        assert!(err.to_string().contains("chain 137"));
    }

    #[test]
    fn test_bad_account_rejected() {
        let raw = BASE.replace("0x8ba1f109551bD432803012645Ac136ddd64DBA72", "not-an-address");

        let err = WalletConfig::from_toml(&raw).unwrap_err();

        assert!(err.to_string().contains("not-an-address"));
    }
}

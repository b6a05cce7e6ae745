//! # Wallet RPC
//!
//! Typed wrappers over the wallet methods the orchestrator issues. Method
//! names are the exact wire names real wallets expect.

use crate::error::ConnectError;
use crate::traits::WalletProvider;
use crate::utils::units::parse_chain_id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod methods {
    pub const ETH_GET_BALANCE: &str = "eth_getBalance";
    pub const ETH_CHAIN_ID: &str = "eth_chainId";
    pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const WALLET_SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    pub const WALLET_ADD_CHAIN: &str = "wallet_addEthereumChain";
}

/// Params object of `wallet_switchEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchChainParams {
    pub chain_id: String,
}

/// Params object of `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
}

fn invalid(method: &'static str, reason: impl Into<String>) -> ConnectError {
    ConnectError::InvalidResponse {
        method,
        reason: reason.into(),
    }
}

/// Quantities come back as hex strings; some wallets answer with plain numbers.
fn quantity(method: &'static str, value: Value) -> Result<String, ConnectError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(method, format!("expected quantity, got {}", other))),
    }
}

pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<String>, ConnectError> {
    let value = provider
        .request(methods::ETH_REQUEST_ACCOUNTS, json!([]))
        .await?;
    serde_json::from_value(value).map_err(|e| invalid(methods::ETH_REQUEST_ACCOUNTS, e.to_string()))
}

/// Balance of `address` at the latest block, in wei as returned by the wallet.
pub async fn get_balance(provider: &dyn WalletProvider, address: &str) -> Result<String, ConnectError> {
    let value = provider
        .request(methods::ETH_GET_BALANCE, json!([address, "latest"]))
        .await?;
    quantity(methods::ETH_GET_BALANCE, value)
}

pub async fn chain_id(provider: &dyn WalletProvider) -> Result<u64, ConnectError> {
    let value = provider.request(methods::ETH_CHAIN_ID, json!([])).await?;
    let raw = quantity(methods::ETH_CHAIN_ID, value)?;
    parse_chain_id(&raw)
}

pub async fn switch_chain(provider: &dyn WalletProvider, chain_id_hex: &str) -> Result<(), ConnectError> {
    let params = SwitchChainParams {
        chain_id: chain_id_hex.to_string(),
    };
    provider
        .request(methods::WALLET_SWITCH_CHAIN, json!([params]))
        .await?;
    Ok(())
}

pub async fn add_chain(provider: &dyn WalletProvider, params: &AddChainParams) -> Result<(), ConnectError> {
    provider
        .request(methods::WALLET_ADD_CHAIN, json!([params]))
        .await?;
    Ok(())
}

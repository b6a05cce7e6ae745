//! Headless EVM wallet exposing the injected-provider interface.
//!
//! Wallet methods (`eth_requestAccounts`, chain switching and registration)
//! are answered locally; node reads are forwarded to the active chain's RPC
//! endpoint.

use anyhow::Result;
use async_trait::async_trait;
use connect_core::rpc::{methods, AddChainParams, SwitchChainParams};
use connect_core::utils::units::{parse_chain_id, to_hex_chain_id};
use connect_core::{
    EventKind, EventSender, ListenerId, ListenerRegistry, NetworkConfig, ProviderError,
    ProviderEvent, WalletProvider,
};
use dialoguer::{theme::ColorfulTheme, Confirm};
use ethers::providers::{Http, Provider, RpcError};
use ethers::types::Address;
use ethers::utils::to_checksum;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const NODE_TIMEOUT: Duration = Duration::from_secs(15);

/// Node methods forwarded verbatim.
const FORWARDED_PREFIXES: [&str; 3] = ["eth_", "net_", "web3_"];

struct Chain {
    name: String,
    node: Provider<Http>,
}

struct WalletState {
    chains: BTreeMap<u64, Chain>,
    active: u64,
    approved: bool,
}

pub struct HeadlessWallet {
    accounts: Vec<String>,
    auto_approve: bool,
    client: Client,
    state: Mutex<WalletState>,
    listeners: ListenerRegistry,
}

impl HeadlessWallet {
    pub fn new(
        accounts: &[String],
        chains: &[NetworkConfig],
        active: u64,
        auto_approve: bool,
    ) -> Result<Self> {
        if accounts.is_empty() {
            anyhow::bail!("Wallet needs at least one account");
        }
        let client = Client::builder().timeout(NODE_TIMEOUT).build()?;

        let accounts = accounts
            .iter()
            .map(|a| -> Result<String> { Ok(to_checksum(&a.parse::<Address>()?, None)) })
            .collect::<Result<Vec<_>>>()?;

        let mut known = BTreeMap::new();
        for network in chains {
            known.insert(network.chain_id, Self::connect_node(&client, network)?);
        }
        if !known.contains_key(&active) {
            anyhow::bail!("Active chain {} is not configured", active);
        }

        Ok(Self {
            accounts,
            auto_approve,
            client,
            state: Mutex::new(WalletState {
                chains: known,
                active,
                approved: false,
            }),
            listeners: ListenerRegistry::new(),
        })
    }

    fn connect_node(client: &Client, network: &NetworkConfig) -> Result<Chain> {
        let url = network
            .rpc_urls
            .first()
            .ok_or_else(|| anyhow::anyhow!("Network {} has no RPC URL", network.chain_id))?;
        let node = Provider::new(Http::new_with_client(
            reqwest::Url::parse(url)?,
            client.clone(),
        ));
        Ok(Chain {
            name: network.name.clone(),
            node,
        })
    }

    fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_chain(&self) -> u64 {
        self.lock().active
    }

    pub fn knows_chain(&self, chain_id: u64) -> bool {
        self.lock().chains.contains_key(&chain_id)
    }

    /// Withdraw the connection approval and tell listeners no account is exposed.
    pub fn revoke(&self) {
        self.lock().approved = false;
        self.listeners
            .emit(&ProviderEvent::AccountsChanged { accounts: vec![] });
    }

    async fn confirm(&self, prompt: String) -> Result<bool, ProviderError> {
        if self.auto_approve {
            return Ok(true);
        }

        let answer = tokio::task::spawn_blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| ProviderError::internal(e.to_string()))?;

        match answer {
            Ok(approved) => Ok(approved),
            Err(e) => {
                warn!("Cannot prompt for approval (not a terminal): {}", e);
                Ok(false)
            }
        }
    }

    async fn request_accounts(&self) -> Result<Value, ProviderError> {
        if !self.lock().approved {
            let prompt = format!("Connect {} to this site?", self.accounts[0]);
            if !self.confirm(prompt).await? {
                info!(target: "wallet_event", "Connection request declined");
                return Err(ProviderError::user_rejected());
            }
            self.lock().approved = true;
        }
        Ok(json!(self.accounts))
    }

    fn switch_chain(&self, params: Value) -> Result<Value, ProviderError> {
        let [request]: [SwitchChainParams; 1] = single_param(params)?;
        let chain_id = parse_chain_id(&request.chain_id)
            .map_err(|e| ProviderError::new(ProviderError::INVALID_PARAMS, e.to_string()))?;

        let changed = {
            let mut state = self.lock();
            if !state.chains.contains_key(&chain_id) {
                return Err(ProviderError::unrecognized_chain(&request.chain_id));
            }
            let changed = state.active != chain_id;
            state.active = chain_id;
            changed
        };

        if changed {
            info!(target: "wallet_event", chain_id, "Wallet switched chain");
            self.listeners.emit(&ProviderEvent::ChainChanged {
                chain_id: to_hex_chain_id(chain_id),
            });
        }
        Ok(Value::Null)
    }

    async fn add_chain(&self, params: Value) -> Result<Value, ProviderError> {
        let [request]: [AddChainParams; 1] = single_param(params)?;
        let chain_id = parse_chain_id(&request.chain_id)
            .map_err(|e| ProviderError::new(ProviderError::INVALID_PARAMS, e.to_string()))?;
        let rpc_url = request
            .rpc_urls
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::new(ProviderError::INVALID_PARAMS, "rpcUrls is empty"))?;

        let network = NetworkConfig::new(chain_id, &request.chain_name, &rpc_url);
        network
            .validate()
            .map_err(|e| ProviderError::new(ProviderError::INVALID_PARAMS, e.to_string()))?;

        let prompt = format!("Add network {} ({}) at {}?", network.name, chain_id, rpc_url);
        if !self.confirm(prompt).await? {
            return Err(ProviderError::user_rejected());
        }

        let chain = Self::connect_node(&self.client, &network)
            .map_err(|e| ProviderError::new(ProviderError::INVALID_PARAMS, e.to_string()))?;
        self.lock().chains.insert(chain_id, chain);
        info!(target: "wallet_event", chain_id, chain = %network.name, "Network added");
        Ok(Value::Null)
    }

    async fn forward(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (node, chain) = {
            let state = self.lock();
            let chain = state
                .chains
                .get(&state.active)
                .ok_or_else(ProviderError::disconnected)?;
            (chain.node.clone(), chain.name.clone())
        };

        debug!(method, chain = %chain, "Forwarding to node");
        node.request::<Value, Value>(method, params)
            .await
            .map_err(|e| match e.as_error_response() {
                Some(rpc) => ProviderError {
                    code: rpc.code,
                    message: rpc.message.clone(),
                    data: rpc.data.clone(),
                },
                None => ProviderError::internal(e.to_string()),
            })
    }
}

/// Wallet methods take their argument as a one-element params array.
fn single_param<T: DeserializeOwned>(params: Value) -> Result<[T; 1], ProviderError> {
    serde_json::from_value(params)
        .map_err(|e| ProviderError::new(ProviderError::INVALID_PARAMS, e.to_string()))
}

#[async_trait]
impl WalletProvider for HeadlessWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            methods::ETH_REQUEST_ACCOUNTS => self.request_accounts().await,
            "eth_accounts" => {
                let approved = self.lock().approved;
                Ok(if approved { json!(self.accounts) } else { json!([]) })
            }
            methods::ETH_CHAIN_ID => Ok(json!(to_hex_chain_id(self.active_chain()))),
            methods::WALLET_SWITCH_CHAIN => self.switch_chain(params),
            methods::WALLET_ADD_CHAIN => self.add_chain(params).await,
            _ if FORWARDED_PREFIXES.iter().any(|p| method.starts_with(p)) => {
                self.forward(method, params).await
            }
            _ => Err(ProviderError::unsupported_method(method)),
        }
    }

    async fn on(&self, kind: EventKind, sender: EventSender) -> Result<ListenerId, ProviderError> {
        Ok(self.listeners.add(kind, sender))
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<(), ProviderError> {
        self.listeners.remove(id);
        Ok(())
    }
}

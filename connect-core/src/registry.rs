//! # Network Registry
//!
//! Read-only lookup of chain display names and RPC endpoints, used when the
//! wallet has to be taught a chain it does not know.

use crate::config::NetworkConfig;
use std::collections::BTreeMap;

pub trait NetworkRegistry: Send + Sync {
    fn name_for_chain_id(&self, chain_id: u64) -> Option<String>;

    /// First RPC endpoint of the network called `name`.
    fn rpc_url_for_name(&self, name: &str) -> Option<String>;
}

/// Registry backed by a fixed table of networks.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkRegistry {
    networks: BTreeMap<u64, NetworkConfig>,
}

impl StaticNetworkRegistry {
    pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Self {
        let mut registry = Self::default();
        for network in networks {
            registry.insert(network);
        }
        registry
    }

    /// Well-known public networks.
    pub fn with_defaults() -> Self {
        Self::new([
            NetworkConfig::new(1, "Ethereum", "https://eth.llamarpc.com"),
            NetworkConfig::new(11155111, "Sepolia", "https://rpc.sepolia.org"),
            NetworkConfig::new(137, "Polygon", "https://polygon-rpc.com"),
            NetworkConfig::new(56, "BNB Smart Chain", "https://bsc-dataseed.binance.org"),
            NetworkConfig::new(42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc"),
            NetworkConfig::new(10, "Optimism", "https://mainnet.optimism.io"),
            NetworkConfig::new(8453, "Base", "https://mainnet.base.org"),
            NetworkConfig::new(43114, "Avalanche", "https://api.avax.network/ext/bc/C/rpc"),
        ])
    }

    /// Defaults overlaid with `networks`; entries with the same chain id replace the default.
    pub fn with_overrides(networks: &[NetworkConfig]) -> Self {
        let mut registry = Self::with_defaults();
        for network in networks {
            registry.insert(network.clone());
        }
        registry
    }

    pub fn insert(&mut self, network: NetworkConfig) -> Option<NetworkConfig> {
        self.networks.insert(network.chain_id, network)
    }

    pub fn get(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.get(&chain_id)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl NetworkRegistry for StaticNetworkRegistry {
    fn name_for_chain_id(&self, chain_id: u64) -> Option<String> {
        self.networks.get(&chain_id).map(|n| n.name.clone())
    }

    fn rpc_url_for_name(&self, name: &str) -> Option<String> {
        self.networks
            .values()
            .find(|n| n.name == name)
            .and_then(|n| n.rpc_urls.first().cloned())
    }
}

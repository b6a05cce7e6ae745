//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use connect_core::{
    AccountRecord, AccountStore, Collaborators, MemoryProviderSource, NetworkConfig,
    Orchestrator, OrchestratorConfig, ProviderHandle, RecordingNotifier, RecordingUiSettings,
    ScriptedProvider, StaticNetworkRegistry,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: &str = "0xABC";
/// 1 ether in wei.
pub const ONE_ETH_HEX: &str = "0xde0b6b3a7640000";
/// 2 ether in wei.
pub const TWO_ETH_HEX: &str = "0x1bc16d674ec80000";

/// Account store keeping every record ever published.
#[derive(Default)]
pub struct HistoryStore {
    history: Mutex<Vec<AccountRecord>>,
}

impl HistoryStore {
    pub fn history(&self) -> Vec<AccountRecord> {
        self.history.lock().unwrap().clone()
    }
}

impl AccountStore for HistoryStore {
    fn current(&self) -> AccountRecord {
        self.history
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, record: AccountRecord) {
        self.history.lock().unwrap().push(record);
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub handle: ProviderHandle,
    pub source: Arc<MemoryProviderSource>,
    pub accounts: Arc<HistoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: Arc<RecordingUiSettings>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let provider = Arc::new(ScriptedProvider::new());
        let handle: ProviderHandle = provider.clone();
        let source = Arc::new(MemoryProviderSource::with_candidate(handle.clone()));
        let accounts = Arc::new(HistoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = Arc::new(RecordingUiSettings::new());
        let registry = Arc::new(StaticNetworkRegistry::new([
            NetworkConfig::new(1, "Ethereum", "https://eth.llamarpc.com"),
            NetworkConfig::new(137, "Polygon", "https://polygon-rpc.com"),
        ]));

        let orchestrator = Orchestrator::new(
            config,
            Collaborators {
                source: source.clone(),
                accounts: accounts.clone(),
                notifier: notifier.clone(),
                settings: settings.clone(),
                registry,
            },
        );

        Self {
            provider,
            handle,
            source,
            accounts,
            notifier,
            settings,
            orchestrator,
        }
    }

    /// Script a wallet exposing `ACCOUNT` with 1 ether on Polygon.
    pub fn with_wallet(self) -> Self {
        self.provider
            .respond_with("eth_requestAccounts", json!([ACCOUNT]))
            .respond_with("eth_getBalance", json!(ONE_ETH_HEX))
            .respond_with("eth_chainId", json!("0x89"));
        self
    }

    pub fn account(&self) -> AccountRecord {
        self.accounts.current()
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_for<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {}", what);
}

mod config;
mod notifier;
mod wallet;

use crate::config::WalletConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use connect_core::utils::units::parse_chain_id;
use connect_core::{
    setup_logger, AccountRecord, Collaborators, ConnectAttempt, ConnectionState,
    MemoryAccountStore, MemoryProviderSource, Orchestrator, ProviderHandle, StaticNetworkRegistry,
    SyncOutcome,
};
use dotenv::dotenv;
use notifier::{ConsoleNotifier, ConsoleUiSettings};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wallet::HeadlessWallet;

const CHAIN_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/evm-wallet/config.toml")]
    config: String,
    /// Approve wallet prompts without asking.
    #[arg(long)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print the selected account.
    Connect,
    /// Connect, then ask the wallet to move to CHAIN_ID (hex or decimal).
    SwitchChain { chain_id: String },
    /// Connect and follow account and chain changes until Ctrl-C.
    Watch,
}

struct App {
    wallet: Arc<HeadlessWallet>,
    source: Arc<MemoryProviderSource>,
    accounts: Arc<MemoryAccountStore>,
    orchestrator: Arc<Orchestrator>,
}

impl App {
    fn new(config: &WalletConfig, auto_approve: bool) -> Result<Self> {
        let wallet = Arc::new(HeadlessWallet::new(
            &config.accounts,
            &config.chains,
            config.chain_id,
            auto_approve || config.auto_approve,
        )?);
        let handle: ProviderHandle = wallet.clone();
        let source = Arc::new(MemoryProviderSource::with_candidate(handle));
        let accounts = Arc::new(MemoryAccountStore::new());
        let registry = StaticNetworkRegistry::with_overrides(&config.orchestrator.networks);

        let orchestrator = Orchestrator::new(
            config.orchestrator.clone(),
            Collaborators {
                source: source.clone(),
                accounts: accounts.clone(),
                notifier: Arc::new(ConsoleNotifier),
                settings: Arc::new(ConsoleUiSettings),
                registry: Arc::new(registry),
            },
        );

        Ok(Self {
            wallet,
            source,
            accounts,
            orchestrator,
        })
    }

    /// Connect and report whether an account is now active.
    async fn connect(&self) -> Result<bool> {
        let attempt = self.orchestrator.connect_metamask().await?;
        match attempt {
            ConnectAttempt::Detected(SyncOutcome::Active) | ConnectAttempt::AlreadyConnected => {
                print_account(&self.orchestrator.account());
                Ok(true)
            }
            ConnectAttempt::Detected(outcome) => {
                warn!("Wallet not connected ({:?})", outcome);
                Ok(false)
            }
            ConnectAttempt::NotFound => {
                error!("No wallet provider available");
                Ok(false)
            }
        }
    }

    async fn switch_chain(&self, chain_id: &str) -> Result<()> {
        let target = parse_chain_id(chain_id)?;
        let mut records = self.accounts.subscribe();

        if !self.orchestrator.change_chain(chain_id).await? {
            warn!(chain_id = target, "Chain switch did not go through");
            return Ok(());
        }
        // Registering a chain leaves the wallet where it was; ask once more.
        if self.wallet.active_chain() != target && self.wallet.knows_chain(target) {
            self.orchestrator.change_chain(chain_id).await?;
        }

        let settled = timeout(
            CHAIN_SETTLE_TIMEOUT,
            records.wait_for(|record| record.chain_id == target),
        )
        .await;
        match settled {
            Ok(Ok(record)) => print_account(&record),
            _ => warn!(chain_id = target, "Account data did not reach the new chain in time"),
        }
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let driver = tokio::spawn(
            self.orchestrator
                .clone()
                .run(self.source.subscribe(), shutdown.clone()),
        );

        self.connect().await?;
        let mut records: watch::Receiver<AccountRecord> = self.accounts.subscribe();
        records.borrow_and_update();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, disconnecting");
                    break;
                }
                changed = records.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let record = records.borrow_and_update().clone();
                    print_account(&record);
                }
            }
        }

        self.disconnect().await;
        shutdown.cancel();
        driver.await.context("Orchestrator driver panicked")?;
        Ok(())
    }

    /// Revoke the wallet's approval so it announces an empty account list,
    /// which the orchestrator treats as a disconnect.
    ///
    /// Returns `false` when the wallet's event did not arrive in time and the
    /// teardown had to be run directly.
    async fn disconnect(&self) -> bool {
        let mut state = self.orchestrator.subscribe_state();
        self.wallet.revoke();
        let settled = timeout(
            DISCONNECT_TIMEOUT,
            state.wait_for(|s| *s == ConnectionState::NoProvider),
        )
        .await
        .is_ok_and(|changed| changed.is_ok());
        if settled {
            return true;
        }
        warn!("Wallet did not report the disconnect, tearing down directly");
        self.orchestrator.on_disconnect().await;
        false
    }
}

fn print_account(record: &AccountRecord) {
    if record.is_empty() {
        info!(target: "wallet_event", "No account selected");
    } else {
        info!(
            target: "wallet_event",
            "Account {} | {:.6} ETH | chain {}",
            record.account,
            record.balance,
            record.chain_id
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = setup_logger();
    dotenv().ok();

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let config = match WalletConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Ok(());
        }
    };

    info!("Configuration loaded for chain ID: {}", config.chain_id);
    let app = App::new(&config, args.yes)?;

    match args.command {
        Command::Connect => {
            app.connect().await?;
        }
        Command::SwitchChain { chain_id } => {
            if app.connect().await? {
                app.switch_chain(&chain_id).await?;
            }
        }
        Command::Watch => app.watch().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect_core::{AccountStore, ProviderSource};

    // Nothing listens on the discard port, so balance reads fail fast.
    const OFFLINE: &str = r#"
        chain_id = 1
        accounts = ["0x8ba1f109551bD432803012645Ac136ddd64DBA72"]
        auto_approve = true

        [[chains]]
        chain_id = 1
        name = "Ethereum"
        rpc_urls = ["http://127.0.0.1:9"]
    "#;

    #[tokio::test]
    async fn test_disconnect_goes_through_wallet_revoke() {
        let config = WalletConfig::from_toml(OFFLINE).unwrap();
        let app = App::new(&config, false).unwrap();
        let outcome = app.orchestrator.bind(app.wallet.clone()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Failed);
        assert!(app.orchestrator.is_bound());

        assert!(app.disconnect().await);

        assert_eq!(app.orchestrator.state(), ConnectionState::NoProvider);
        assert!(!app.orchestrator.is_bound());
        assert!(app.accounts.current().is_empty());
        assert!(app.source.current().is_none());
    }
}

//! # Connection Orchestrator
//!
//! Reconciles the active provider, the selected account and the selected
//! chain into one observable connection state.
//!
//! Lifecycle of a provider handle:
//!
//! ```text
//! NoProvider -> Detecting -> Subscribing -> Syncing -> Active -> Disconnecting -> NoProvider
//! ```
//!
//! Every bound handle carries a generation number. Work started for one
//! generation never publishes once that binding is gone, so a response that
//! arrives after a disconnect cannot resurrect account data.

use crate::account::AccountRecord;
use crate::config::{Notice, OrchestratorConfig, RefreshPolicy};
use crate::error::{ConnectError, ProviderErrorKind};
use crate::provider::{EventKind, ListenerId, ProviderEvent};
use crate::registry::NetworkRegistry;
use crate::rpc::{self, AddChainParams};
use crate::traits::{
    same_handle, AccountStore, NotificationSink, ProviderHandle, ProviderSource, UiSettings,
};
use crate::utils::units::{parse_chain_id, parse_eth, to_hex_chain_id};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Externally owned collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ProviderSource>,
    pub accounts: Arc<dyn AccountStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub settings: Arc<dyn UiSettings>,
    pub registry: Arc<dyn NetworkRegistry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NoProvider,
    Detecting,
    Subscribing,
    Syncing,
    Active,
    Disconnecting,
}

/// Result of [`Orchestrator::connect_metamask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAttempt {
    /// A provider was already present; nothing was done.
    AlreadyConnected,
    /// Detection found a provider and it was bound.
    Detected(SyncOutcome),
    NotFound,
}

impl ConnectAttempt {
    pub fn provider_found(&self) -> bool {
        !matches!(self, ConnectAttempt::NotFound)
    }
}

/// How one account synchronization ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The handle was already bound; nothing re-ran.
    AlreadyBound,
    /// Account record published, connection active.
    Active,
    /// The wallet answered with no accounts.
    NoAccounts,
    /// The user rejected the request; the connection was torn down.
    Rejected,
    /// The wallet failed with an unclassified error; logged only.
    Failed,
    /// The binding changed while the sync was in flight; result dropped.
    Superseded,
}

pub type DisconnectHook = Arc<dyn Fn() + Send + Sync>;

struct Binding {
    handle: ProviderHandle,
    generation: u64,
    listeners: Vec<ListenerId>,
}

/// A refresh call that failed, tagged with the wallet method that broke.
struct RefreshFailure {
    method: &'static str,
    error: ConnectError,
}

impl RefreshFailure {
    fn at(method: &'static str) -> impl FnOnce(ConnectError) -> Self {
        move |error| Self { method, error }
    }

    fn log(&self, account: &str) {
        match self.error.provider_error() {
            Some(pe) => warn!(
                account,
                method = self.method,
                code = pe.code,
                "Account refresh failed: {}",
                pe.message
            ),
            None => warn!(account, method = self.method, "Account refresh failed: {}", self.error),
        }
    }
}

#[derive(Default)]
struct Inner {
    binding: Option<Binding>,
    connect_mode: String,
    disconnect_hook: Option<DisconnectHook>,
    // Bumped by every teardown; a bind that started before it must not install.
    disconnect_epoch: u64,
}

impl Inner {
    fn is_bound_to(&self, generation: u64) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.generation == generation)
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    collab: Collaborators,
    inner: Mutex<Inner>,
    generation: AtomicU64,
    refresh_seq: AtomicU64,
    state: watch::Sender<ConnectionState>,
    // Serializes binding so one handle is never subscribed twice.
    bind_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, collab: Collaborators) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::NoProvider);
        Arc::new(Self {
            config,
            collab,
            inner: Mutex::new(Inner::default()),
            generation: AtomicU64::new(0),
            refresh_seq: AtomicU64::new(0),
            state,
            bind_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {:?} -> {:?}", previous, state);
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Current connect-mode flag; empty when disconnected.
    pub fn connect_mode(&self) -> String {
        self.lock_inner().connect_mode.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.lock_inner().binding.is_some()
    }

    pub fn account(&self) -> AccountRecord {
        self.collab.accounts.current()
    }

    /// Install a callback run at the start of every disconnect.
    pub fn set_disconnect_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lock_inner().disconnect_hook = Some(Arc::new(hook));
    }

    pub fn clear_disconnect_hook(&self) {
        self.lock_inner().disconnect_hook = None;
    }

    fn bound(&self) -> Option<(ProviderHandle, u64)> {
        self.lock_inner()
            .binding
            .as_ref()
            .map(|b| (b.handle.clone(), b.generation))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_inner().is_bound_to(generation)
    }

    fn show(&self, notice: &Notice) {
        self.collab
            .notifier
            .notify(&notice.title, &notice.message, &notice.action_label);
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    /// React to the provider source supplying `handle` (or none).
    pub async fn provider_changed(
        self: &Arc<Self>,
        handle: Option<ProviderHandle>,
    ) -> Result<Option<SyncOutcome>, ConnectError> {
        match handle {
            Some(handle) => self.bind(handle).await.map(Some),
            None => {
                self.detach().await;
                Ok(None)
            }
        }
    }

    /// Subscribe to `handle` and run the initial account sync.
    ///
    /// Binding the handle that is already bound is a no-op. Binding a
    /// different handle first removes every listener of the previous one.
    /// A disconnect that lands while listeners are being added wins: the new
    /// listeners are removed again and the bind reports
    /// [`SyncOutcome::Superseded`].
    pub async fn bind(self: &Arc<Self>, handle: ProviderHandle) -> Result<SyncOutcome, ConnectError> {
        let generation = {
            let _guard = self.bind_lock.lock().await;

            let (previous, epoch) = {
                let mut inner = self.lock_inner();
                if let Some(binding) = &inner.binding {
                    if same_handle(&binding.handle, &handle) {
                        debug!(generation = binding.generation, "Provider already bound");
                        return Ok(SyncOutcome::AlreadyBound);
                    }
                }
                (inner.binding.take(), inner.disconnect_epoch)
            };
            let replaced = previous.is_some();
            if let Some(previous) = previous {
                info!(generation = previous.generation, "Provider replaced, releasing listeners");
                release(previous).await;
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.set_state(ConnectionState::Subscribing);

            let (tx, rx) = mpsc::unbounded_channel();
            let mut listeners = Vec::with_capacity(EventKind::ALL.len());
            for kind in EventKind::ALL {
                match handle.on(kind, tx.clone()).await {
                    Ok(id) => listeners.push(id),
                    Err(source) => {
                        error!(event = %kind, code = source.code, "Subscription failed: {}", source.message);
                        for id in listeners {
                            let _ = handle.remove_listener(id).await;
                        }
                        if replaced {
                            // The old provider's data must not outlive its listeners.
                            let mut inner = self.lock_inner();
                            inner.connect_mode.clear();
                            self.collab.accounts.set(AccountRecord::default());
                        }
                        self.set_state(ConnectionState::NoProvider);
                        return Err(ConnectError::Subscription {
                            event: kind.as_str(),
                            source,
                        });
                    }
                }
            }
            drop(tx);

            let installed = {
                let mut inner = self.lock_inner();
                if inner.disconnect_epoch == epoch {
                    inner.binding = Some(Binding {
                        handle: handle.clone(),
                        generation,
                        listeners: std::mem::take(&mut listeners),
                    });
                    true
                } else {
                    false
                }
            };
            if !installed {
                info!(generation, "Disconnected while subscribing, dropping new listeners");
                for id in listeners {
                    let _ = handle.remove_listener(id).await;
                }
                return Ok(SyncOutcome::Superseded);
            }
            self.spawn_event_pump(generation, rx);
            generation
        };

        debug!(generation, "Provider bound");
        Ok(self.sync_accounts(&handle, generation).await)
    }

    /// Drop the binding without the full disconnect sequence, used when the
    /// source loses its handle on its own.
    async fn detach(&self) {
        let binding = {
            let mut inner = self.lock_inner();
            inner.disconnect_epoch += 1;
            inner.binding.take()
        };
        if let Some(binding) = binding {
            debug!(generation = binding.generation, "Provider gone, detaching");
            release(binding).await;
            {
                let mut inner = self.lock_inner();
                inner.connect_mode.clear();
                self.collab.accounts.set(AccountRecord::default());
            }
        }
        self.set_state(ConnectionState::NoProvider);
    }

    fn spawn_event_pump(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    ) {
        let this: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(this) = this.upgrade() else { break };
                if !this.is_current(generation) {
                    debug!(generation, "Binding gone, stopping event pump");
                    break;
                }
                this.handle_event(generation, event).await;
            }
        });
    }

    async fn handle_event(self: &Arc<Self>, generation: u64, event: ProviderEvent) {
        let Some((handle, bound_generation)) = self.bound() else {
            return;
        };
        if bound_generation != generation {
            return;
        }

        match event {
            ProviderEvent::AccountsChanged { accounts } => match accounts.first() {
                None => {
                    info!(target: "wallet_event", "Wallet exposed no accounts");
                    self.on_disconnect().await;
                }
                Some(account) => {
                    info!(target: "wallet_event", account = %account, "Account changed");
                    if let Err(failure) = self.refresh(&handle, generation, account).await {
                        failure.log(account);
                    }
                }
            },
            ProviderEvent::ChainChanged { chain_id } => {
                info!(target: "wallet_event", chain_id = %chain_id, "Chain changed");
                self.sync_accounts(&handle, generation).await;
            }
            ProviderEvent::Connect { chain_id } => {
                info!(target: "wallet_event", chain_id = %chain_id, "Provider connected");
                self.sync_accounts(&handle, generation).await;
            }
            ProviderEvent::Disconnect { error } => {
                info!(target: "wallet_event", code = error.code, "Provider disconnected: {}", error.message);
                self.on_disconnect().await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Account synchronization
    // ------------------------------------------------------------------

    async fn sync_accounts(&self, handle: &ProviderHandle, generation: u64) -> SyncOutcome {
        self.set_state(ConnectionState::Syncing);

        let accounts = match rpc::request_accounts(handle.as_ref()).await {
            Ok(accounts) => accounts,
            Err(ConnectError::Provider(e)) if e.kind() == ProviderErrorKind::UserRejected => {
                if !self.is_current(generation) {
                    return SyncOutcome::Superseded;
                }
                info!(target: "wallet_event", "Connection request FAILED: rejected by user");
                self.on_disconnect().await;
                self.show(&self.config.notices.connect_rejected);
                return SyncOutcome::Rejected;
            }
            Err(e) => {
                match e.provider_error() {
                    Some(pe) => warn!(
                        method = rpc::methods::ETH_REQUEST_ACCOUNTS,
                        code = pe.code,
                        "Account request failed: {}",
                        pe.message
                    ),
                    None => warn!(
                        method = rpc::methods::ETH_REQUEST_ACCOUNTS,
                        "Account request failed: {}", e
                    ),
                }
                self.settle(generation);
                return SyncOutcome::Failed;
            }
        };

        let Some(account) = accounts.first() else {
            debug!(generation, "Wallet returned no accounts");
            self.settle(generation);
            return SyncOutcome::NoAccounts;
        };

        if !self.is_current(generation) {
            return SyncOutcome::Superseded;
        }
        self.collab.source.save();
        self.collab.settings.set_ui_mode(&self.config.ui_mode);

        match self.refresh(handle, generation, account).await {
            Ok(Some(record)) => {
                {
                    let mut inner = self.lock_inner();
                    if !inner.is_bound_to(generation) {
                        return SyncOutcome::Superseded;
                    }
                    inner.connect_mode = self.config.connect_mode_label.clone();
                }
                self.set_state(ConnectionState::Active);
                info!(
                    target: "wallet_event",
                    account = %record.account,
                    chain_id = record.chain_id,
                    "Wallet CONNECTED"
                );
                SyncOutcome::Active
            }
            Ok(None) => SyncOutcome::Superseded,
            Err(failure) => {
                failure.log(account);
                self.settle(generation);
                SyncOutcome::Failed
            }
        }
    }

    /// A sync that did not reach `Active` leaves the binding listening.
    fn settle(&self, generation: u64) {
        if self.is_current(generation) && self.state() == ConnectionState::Syncing {
            self.set_state(ConnectionState::Subscribing);
        }
    }

    /// Read balance then chain id for `account` and publish them as one record.
    ///
    /// Returns `None` when the result was dropped because the binding went
    /// away or, under [`RefreshPolicy::LatestOnly`], a newer refresh started.
    async fn refresh(
        &self,
        handle: &ProviderHandle,
        generation: u64,
        account: &str,
    ) -> Result<Option<AccountRecord>, RefreshFailure> {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let balance = rpc::get_balance(handle.as_ref(), account)
            .await
            .map_err(RefreshFailure::at(rpc::methods::ETH_GET_BALANCE))?;
        let chain_id = rpc::chain_id(handle.as_ref())
            .await
            .map_err(RefreshFailure::at(rpc::methods::ETH_CHAIN_ID))?;
        let record = AccountRecord {
            account: account.to_string(),
            balance: parse_eth(&balance).map_err(RefreshFailure::at(rpc::methods::ETH_GET_BALANCE))?,
            chain_id,
        };

        let inner = self.lock_inner();
        if !inner.is_bound_to(generation) {
            debug!(generation, account, "Dropping refresh for released provider");
            return Ok(None);
        }
        if self.config.refresh_policy == RefreshPolicy::LatestOnly
            && self.refresh_seq.load(Ordering::SeqCst) != seq
        {
            debug!(seq, account, "Dropping superseded refresh");
            return Ok(None);
        }
        self.collab.accounts.set(record.clone());
        drop(inner);

        debug!(account, chain_id, balance = record.balance, "Account record published");
        Ok(Some(record))
    }

    /// Refresh the record for `account` against the bound provider.
    ///
    /// Fails with [`ConnectError::NoProvider`] when nothing is bound. Wallet
    /// failures are logged and leave the previous record in place; like a
    /// result dropped before publishing, they return `None`.
    pub async fn update_account_data(
        &self,
        account: &str,
    ) -> Result<Option<AccountRecord>, ConnectError> {
        let (handle, generation) = self.bound().ok_or(ConnectError::NoProvider)?;
        match self.refresh(&handle, generation, account).await {
            Ok(record) => Ok(record),
            Err(failure) => {
                failure.log(account);
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Disconnect
    // ------------------------------------------------------------------

    /// Tear down every piece of provider-derived state.
    ///
    /// Runs the same fixed sequence whatever triggered it: hook, forget,
    /// remove, release listeners, reset UI mode, clear connect mode, reset
    /// the account record.
    pub async fn on_disconnect(&self) {
        self.set_state(ConnectionState::Disconnecting);

        let hook = {
            let mut inner = self.lock_inner();
            inner.disconnect_epoch += 1;
            inner.disconnect_hook.clone()
        };
        if let Some(hook) = hook {
            hook();
        }

        self.collab.source.forget();
        self.collab.source.remove();

        let binding = self.lock_inner().binding.take();
        if let Some(binding) = binding {
            release(binding).await;
        }

        self.collab.settings.set_ui_mode(&self.config.ui_mode);
        {
            let mut inner = self.lock_inner();
            inner.connect_mode.clear();
            self.collab.accounts.set(AccountRecord::default());
        }

        self.set_state(ConnectionState::NoProvider);
        info!(target: "wallet_event", "Wallet DISCONNECTED");
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Detect and bind a provider unless one is already present.
    pub async fn connect_metamask(self: &Arc<Self>) -> Result<ConnectAttempt, ConnectError> {
        if self.collab.source.current().is_some() {
            debug!("Provider already present, skipping detection");
            return Ok(ConnectAttempt::AlreadyConnected);
        }

        self.set_state(ConnectionState::Detecting);
        match self.collab.source.detect().await {
            Some(handle) => {
                let outcome = self.bind(handle).await?;
                Ok(ConnectAttempt::Detected(outcome))
            }
            None => {
                info!(target: "wallet_event", "No wallet provider detected");
                self.set_state(ConnectionState::NoProvider);
                Ok(ConnectAttempt::NotFound)
            }
        }
    }

    /// Ask the wallet to switch to `chain_id_hex`, registering the chain first
    /// if the wallet does not know it.
    ///
    /// Returns `Ok(true)` when the switch succeeded or the chain was added.
    /// Adding a chain does not guarantee the wallet moved to it.
    pub async fn change_chain(&self, chain_id_hex: &str) -> Result<bool, ConnectError> {
        let (handle, _) = self.bound().ok_or(ConnectError::NoProvider)?;
        let chain_id = parse_chain_id(chain_id_hex)?;
        let chain_hex = to_hex_chain_id(chain_id);

        let err = match rpc::switch_chain(handle.as_ref(), &chain_hex).await {
            Ok(()) => {
                info!(target: "wallet_event", chain_id, "Switched chain");
                return Ok(true);
            }
            Err(err) => err,
        };

        let Some(provider_err) = err.provider_error() else {
            warn!(chain_id, method = rpc::methods::WALLET_SWITCH_CHAIN, "Chain switch failed: {}", err);
            return Ok(false);
        };

        match provider_err.kind() {
            ProviderErrorKind::RequestPending => {
                warn!(chain_id, "Chain switch already pending in wallet");
                self.show(&self.config.notices.request_pending);
                Ok(false)
            }
            ProviderErrorKind::UnrecognizedChain => {
                Ok(self.add_chain(&handle, chain_id, &chain_hex).await)
            }
            _ => {
                warn!(
                    chain_id,
                    method = rpc::methods::WALLET_SWITCH_CHAIN,
                    code = provider_err.code,
                    "Chain switch failed: {}",
                    provider_err.message
                );
                Ok(false)
            }
        }
    }

    async fn add_chain(&self, handle: &ProviderHandle, chain_id: u64, chain_hex: &str) -> bool {
        let Some(chain_name) = self.collab.registry.name_for_chain_id(chain_id) else {
            warn!(chain_id, "{}", ConnectError::UnknownChain { chain_id });
            return false;
        };
        let Some(rpc_url) = self.collab.registry.rpc_url_for_name(&chain_name) else {
            warn!(chain_id, chain = %chain_name, "No RPC endpoint registered");
            return false;
        };

        let params = AddChainParams {
            chain_id: chain_hex.to_string(),
            chain_name,
            rpc_urls: vec![rpc_url],
        };
        match rpc::add_chain(handle.as_ref(), &params).await {
            Ok(()) => {
                info!(target: "wallet_event", chain_id, chain = %params.chain_name, "Chain added to wallet");
                true
            }
            Err(e) => {
                warn!(chain_id, method = rpc::methods::WALLET_ADD_CHAIN, "Adding chain failed: {}", e);
                false
            }
        }
    }

    /// Follow the provider source until `shutdown` fires, rebinding on every change.
    pub async fn run(
        self: Arc<Self>,
        mut changes: watch::Receiver<Option<ProviderHandle>>,
        shutdown: CancellationToken,
    ) {
        let initial = changes.borrow_and_update().clone();
        self.apply_change(initial).await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Orchestrator driver stopping");
                    break;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        debug!("Provider source closed");
                        break;
                    }
                    let handle = changes.borrow_and_update().clone();
                    self.apply_change(handle).await;
                }
            }
        }
    }

    async fn apply_change(self: &Arc<Self>, handle: Option<ProviderHandle>) {
        if let Err(e) = self.provider_changed(handle).await {
            error!("Provider sync FAILED: {}", e);
        }
    }
}

async fn release(binding: Binding) {
    for id in binding.listeners {
        if let Err(e) = binding.handle.remove_listener(id).await {
            warn!(listener = %id, code = e.code, "Failed to remove listener: {}", e.message);
        }
    }
}

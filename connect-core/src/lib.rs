//! # Connect Core - Wallet Connection Orchestration
//!
//! This crate manages the lifecycle of a connection to an injected wallet
//! provider: which provider is active, which account is selected and which
//! chain is selected, reconciled into one observable connection state.
//!
//! ## Modules
//!
//! - [`orchestrator`] - Connection state machine and public operations
//! - [`provider`] - Provider events, listener bookkeeping, scripted provider
//! - [`rpc`] - Typed wallet RPC calls
//! - [`traits`] - Provider and collaborator trait definitions
//! - [`collab`] - In-memory collaborator implementations
//! - [`registry`] - Chain id to network metadata lookup
//! - [`config`] - Orchestrator configuration
//! - [`error`] - Typed error handling with thiserror
//! - [`utils`] - Logging setup and unit conversions

pub mod account;
pub mod collab;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod rpc;
pub mod traits;
pub mod utils;

pub use account::AccountRecord;
pub use collab::{MemoryAccountStore, MemoryProviderSource, RecordingNotifier, RecordingUiSettings};
pub use config::{NetworkConfig, Notice, NoticeConfig, OrchestratorConfig, RefreshPolicy};
pub use error::{ConfigError, ConnectError, ProviderError, ProviderErrorKind};
pub use orchestrator::{
    Collaborators, ConnectAttempt, ConnectionState, DisconnectHook, Orchestrator, SyncOutcome,
};
pub use provider::{
    EventKind, EventSender, ListenerId, ListenerRegistry, ProviderEvent, ScriptedProvider,
};
pub use registry::{NetworkRegistry, StaticNetworkRegistry};
pub use traits::{
    same_handle, AccountStore, NotificationSink, ProviderHandle, ProviderSource, UiSettings,
    WalletProvider,
};
pub use utils::{setup_logger, setup_logger_with_file};

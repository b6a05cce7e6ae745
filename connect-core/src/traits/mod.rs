use crate::account::AccountRecord;
use crate::error::ProviderError;
use crate::provider::{EventKind, EventSender, ListenerId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// An injected wallet: a JSON-RPC style `request` method plus listener
/// registration for provider events.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Issue a request. `params` is the raw JSON params array/object.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register `sender` to receive every event of `kind`.
    async fn on(&self, kind: EventKind, sender: EventSender) -> Result<ListenerId, ProviderError>;

    /// Remove a listener registered with [`WalletProvider::on`].
    async fn remove_listener(&self, id: ListenerId) -> Result<(), ProviderError>;
}

/// Shared reference to a provider. Owned by the provider source.
pub type ProviderHandle = Arc<dyn WalletProvider>;

/// Handles are the same provider when they share an allocation.
pub fn same_handle(a: &ProviderHandle, b: &ProviderHandle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Detects and holds the injected provider.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// The provider currently supplied, if any.
    fn current(&self) -> Option<ProviderHandle>;

    /// Look for an injected provider and make it current when found.
    async fn detect(&self) -> Option<ProviderHandle>;

    /// Remember the current provider for the next session.
    fn save(&self);

    /// Drop the current provider.
    fn remove(&self);

    /// Forget the remembered provider.
    fn forget(&self);
}

/// Holds the currently known account record.
pub trait AccountStore: Send + Sync {
    fn current(&self) -> AccountRecord;

    /// Replace the whole record.
    fn set(&self, record: AccountRecord);
}

/// Surfaces user-facing dialogs.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str, action_label: &str);
}

/// Shared UI settings written on connect and disconnect.
pub trait UiSettings: Send + Sync {
    fn set_ui_mode(&self, mode: &str);
}

//! # Provider Events
//!
//! Event types delivered by wallet providers, plus reusable pieces for
//! provider implementations.

use crate::error::ProviderError;
use std::fmt;
use tokio::sync::mpsc;

pub mod listeners;
pub mod scripted;

pub use listeners::ListenerRegistry;
pub use scripted::{RecordedCall, ScriptedProvider};

/// Channel end handed to a provider when subscribing.
pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;

/// Identifies one registered listener on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChainChanged,
    AccountsChanged,
    Connect,
    Disconnect,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::ChainChanged,
        EventKind::AccountsChanged,
        EventKind::Connect,
        EventKind::Disconnect,
    ];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChainChanged => "chainChanged",
            EventKind::AccountsChanged => "accountsChanged",
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Hex chain id of the newly selected chain.
    ChainChanged { chain_id: String },
    /// Accounts now exposed; empty when the wallet locked or revoked access.
    AccountsChanged { accounts: Vec<String> },
    Connect { chain_id: String },
    Disconnect { error: ProviderError },
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::ChainChanged { .. } => EventKind::ChainChanged,
            ProviderEvent::AccountsChanged { .. } => EventKind::AccountsChanged,
            ProviderEvent::Connect { .. } => EventKind::Connect,
            ProviderEvent::Disconnect { .. } => EventKind::Disconnect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["chainChanged", "accountsChanged", "connect", "disconnect"]
        );
    }

    #[test]
    fn test_event_kind_of_payload() {
        let event = ProviderEvent::AccountsChanged { accounts: vec![] };
        assert_eq!(event.kind(), EventKind::AccountsChanged);
        let event = ProviderEvent::Disconnect {
            error: ProviderError::disconnected(),
        };
        assert_eq!(event.kind().to_string(), "disconnect");
    }
}

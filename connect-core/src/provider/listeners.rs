use super::{EventKind, EventSender, ListenerId, ProviderEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug)]
struct Listener {
    id: ListenerId,
    kind: EventKind,
    sender: EventSender,
}

/// Listener bookkeeping for provider implementations.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, kind: EventKind, sender: EventSender) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock().push(Listener { id, kind, sender });
        id
    }

    /// Returns false if the id was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener of its kind and return how many got it.
    /// Listeners whose receiving end is gone are dropped.
    pub fn emit(&self, event: &ProviderEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        self.lock().retain(|l| {
            if l.kind != kind {
                return true;
            }
            match l.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!("Dropping closed {} ({})", l.id, kind);
                    false
                }
            }
        });
        delivered
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|l| l.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add(EventKind::ChainChanged, tx.clone());
        registry.add(EventKind::Connect, tx);

        let delivered = registry.emit(&ProviderEvent::ChainChanged {
            chain_id: "0x1".to_string(),
        });

        assert_eq!(delivered, 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ProviderEvent::ChainChanged {
                chain_id: "0x1".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_and_closed_receivers() {
        let registry = ListenerRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.add(EventKind::AccountsChanged, tx.clone());
        registry.add(EventKind::AccountsChanged, tx);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.count(EventKind::AccountsChanged), 1);

        drop(rx);
        let delivered = registry.emit(&ProviderEvent::AccountsChanged { accounts: vec![] });
        assert_eq!(delivered, 0);
        assert!(registry.is_empty());
    }
}

//! # Scripted Provider
//!
//! In-memory [`WalletProvider`] driven by queued responses. Used by the test
//! suites and by dry runs that need a wallet without a browser.

use super::{EventKind, EventSender, ListenerId, ListenerRegistry, ProviderEvent};
use crate::error::ProviderError;
use crate::traits::WalletProvider;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// A request observed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

type Reply = Result<Value, ProviderError>;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Reply>>,
    sticky: HashMap<String, Reply>,
    holds: HashMap<String, VecDeque<oneshot::Receiver<()>>>,
    subscribe_holds: HashMap<EventKind, oneshot::Receiver<()>>,
    calls: Vec<RecordedCall>,
    subscribe_failure: Option<(EventKind, ProviderError)>,
}

/// Provider whose answers are scripted per method.
///
/// Queued replies are consumed in call order; once a method's queue is empty
/// its sticky reply (if any) is returned, otherwise the request fails with
/// `4200 unsupported method`.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    listeners: ListenerRegistry,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer every call to `method` with `value` once the queue is drained.
    pub fn respond_with(&self, method: &str, value: Value) -> &Self {
        self.lock().sticky.insert(method.to_string(), Ok(value));
        self
    }

    /// Fail every call to `method` once the queue is drained.
    pub fn fail_always(&self, method: &str, error: ProviderError) -> &Self {
        self.lock().sticky.insert(method.to_string(), Err(error));
        self
    }

    /// Queue a single reply for the next call to `method`.
    pub fn push_response(&self, method: &str, value: Value) -> &Self {
        self.push_reply(method, Ok(value))
    }

    /// Queue a single failure for the next call to `method`.
    pub fn push_error(&self, method: &str, error: ProviderError) -> &Self {
        self.push_reply(method, Err(error))
    }

    fn push_reply(&self, method: &str, reply: Reply) -> &Self {
        self.lock()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Hold the next call to `method` until the returned sender fires or is
    /// dropped. The reply is picked when the call arrives, not when released.
    pub fn hold_next(&self, method: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .holds
            .entry(method.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    /// Hold the next subscription to `kind` until the returned sender fires
    /// or is dropped.
    pub fn hold_subscription(&self, kind: EventKind) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().subscribe_holds.insert(kind, rx);
        tx
    }

    /// Make subscribing to `kind` fail with `error`.
    pub fn fail_subscription(&self, kind: EventKind, error: ProviderError) {
        self.lock().subscribe_failure = Some((kind, error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Params of every call made to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.params.clone())
            .collect()
    }

    /// Emit an event to registered listeners.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.listeners.emit(&event)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners_for(&self, kind: EventKind) -> usize {
        self.listeners.count(kind)
    }
}

#[async_trait]
impl WalletProvider for ScriptedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (reply, hold) = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                method: method.to_string(),
                params,
            });
            let queued = script.queued.get_mut(method).and_then(|q| q.pop_front());
            let reply = match queued {
                Some(reply) => reply,
                None => script
                    .sticky
                    .get(method)
                    .cloned()
                    .unwrap_or_else(|| Err(ProviderError::unsupported_method(method))),
            };
            let hold = script.holds.get_mut(method).and_then(|q| q.pop_front());
            (reply, hold)
        };

        if let Some(hold) = hold {
            // Released or abandoned, either way the call proceeds.
            let _ = hold.await;
        }
        reply
    }

    async fn on(&self, kind: EventKind, sender: EventSender) -> Result<ListenerId, ProviderError> {
        let hold = self.lock().subscribe_holds.remove(&kind);
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        if let Some((failing, error)) = &self.lock().subscribe_failure {
            if *failing == kind {
                return Err(error.clone());
            }
        }
        Ok(self.listeners.add(kind, sender))
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<(), ProviderError> {
        self.listeners.remove(id);
        Ok(())
    }
}

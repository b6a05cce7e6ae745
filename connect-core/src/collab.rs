//! # In-Memory Collaborators
//!
//! Default implementations of the orchestrator's collaborator traits. Each
//! publishes through a `watch` channel or keeps a history so hosts and tests
//! can observe what the orchestrator did.

use crate::account::AccountRecord;
use crate::config::Notice;
use crate::traits::{AccountStore, NotificationSink, ProviderHandle, ProviderSource, UiSettings};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Provider source holding a single detectable candidate.
pub struct MemoryProviderSource {
    candidate: Mutex<Option<ProviderHandle>>,
    current: watch::Sender<Option<ProviderHandle>>,
    remembered: AtomicBool,
    detect_calls: AtomicUsize,
}

impl Default for MemoryProviderSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProviderSource {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            candidate: Mutex::new(None),
            current,
            remembered: AtomicBool::new(false),
            detect_calls: AtomicUsize::new(0),
        }
    }

    /// A source whose `detect` will find `handle`.
    pub fn with_candidate(handle: ProviderHandle) -> Self {
        let source = Self::new();
        source.set_candidate(Some(handle));
        source
    }

    pub fn set_candidate(&self, handle: Option<ProviderHandle>) {
        *lock(&self.candidate) = handle;
    }

    /// Supply `handle` as current without going through detection.
    pub fn inject(&self, handle: ProviderHandle) {
        self.current.send_replace(Some(handle));
    }

    /// Receiver that observes every change of the current handle.
    pub fn subscribe(&self) -> watch::Receiver<Option<ProviderHandle>> {
        self.current.subscribe()
    }

    pub fn is_remembered(&self) -> bool {
        self.remembered.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderSource for MemoryProviderSource {
    fn current(&self) -> Option<ProviderHandle> {
        self.current.borrow().clone()
    }

    async fn detect(&self) -> Option<ProviderHandle> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let found = lock(&self.candidate).clone();
        match &found {
            Some(handle) => {
                self.current.send_replace(Some(handle.clone()));
            }
            None => debug!("No injected provider found"),
        }
        found
    }

    fn save(&self) {
        if self.current.borrow().is_some() {
            self.remembered.store(true, Ordering::SeqCst);
        }
    }

    fn remove(&self) {
        self.current.send_replace(None);
    }

    fn forget(&self) {
        self.remembered.store(false, Ordering::SeqCst);
    }
}

/// Account store publishing every replacement to watchers.
pub struct MemoryAccountStore {
    record: watch::Sender<AccountRecord>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        let (record, _) = watch::channel(AccountRecord::default());
        Self { record }
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountRecord> {
        self.record.subscribe()
    }
}

impl AccountStore for MemoryAccountStore {
    fn current(&self) -> AccountRecord {
        self.record.borrow().clone()
    }

    fn set(&self, record: AccountRecord) {
        self.record.send_replace(record);
    }
}

/// Notification sink that logs and keeps every notice shown.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.shown).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.shown).len()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, action_label: &str) {
        warn!(target: "wallet_event", "{}: {}", title, message);
        lock(&self.shown).push(Notice {
            title: title.to_string(),
            message: message.to_string(),
            action_label: action_label.to_string(),
        });
    }
}

/// UI settings that remember every mode written.
#[derive(Debug, Default)]
pub struct RecordingUiSettings {
    history: Mutex<Vec<String>>,
}

impl RecordingUiSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last mode written, if any.
    pub fn mode(&self) -> Option<String> {
        lock(&self.history).last().cloned()
    }

    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

impl UiSettings for RecordingUiSettings {
    fn set_ui_mode(&self, mode: &str) {
        info!("UI mode -> {}", mode);
        lock(&self.history).push(mode.to_string());
    }
}

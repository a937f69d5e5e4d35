//! In-memory StateStore used by tests and the demo runtime.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::store::{StateStore, StoreSubscription};

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
}

/// Keyed last-write-wins store held entirely in process memory.
///
/// Cheap to clone conceptually via `Arc`; the store itself is `Sync` and
/// is shared by reference. Writes fan out synchronously to every live
/// subscriber of the written key, preserving write order per key.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document at `key`, if any. Test and demo convenience;
    /// not part of the `StateStore` contract.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.inner.lock() {
            Ok(inner) => inner.documents.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().documents.get(key).cloned(),
        }
    }
}

impl StateStore for MemoryStore {
    fn write(&self, key: &str, document: Value) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        inner.documents.insert(key.to_string(), document.clone());
        if let Some(senders) = inner.subscribers.get_mut(key) {
            // Dropped receivers are pruned on the next write to the key.
            senders.retain(|tx| tx.send(document.clone()).is_ok());
        }
        Ok(())
    }

    fn subscribe(&self, key: &str) -> Result<StoreSubscription, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(current) = inner.documents.get(key) {
            // Unbounded send to a receiver we still hold cannot fail.
            let _ = tx.send(current.clone());
        }
        inner
            .subscribers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        Ok(StoreSubscription::new(rx))
    }
}

// ─── Tests ────────────────────────────────────────────────────────

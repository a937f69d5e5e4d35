//! StateStore trait and subscription handle. Enables fake-store injection
//! for testing the engine without a networked backend.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// A live subscription to one key.
///
/// Snapshots arrive in the store's own per-key order. On open, the
/// current value of the key (if any) is delivered first, so a subscriber
/// always starts from the latest state rather than waiting for the next
/// write. Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct StoreSubscription {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl StoreSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the store end has closed.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// Last-write-wins keyed document store with push notification.
///
/// Write and subscribe are the only operations the protocol needs; a
/// networked store implements this same trait out of tree.
pub trait StateStore: Send + Sync {
    /// Overwrite the document at `key`. Subscribers of that key observe
    /// the new value.
    fn write(&self, key: &str, document: Value) -> Result<(), StoreError>;

    /// Open a subscription to `key`.
    fn subscribe(&self, key: &str) -> Result<StoreSubscription, StoreError>;
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn write(&self, key: &str, document: Value) -> Result<(), StoreError> {
        (**self).write(key, document)
    }

    fn subscribe(&self, key: &str) -> Result<StoreSubscription, StoreError> {
        (**self).subscribe(key)
    }
}

impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    fn write(&self, key: &str, document: Value) -> Result<(), StoreError> {
        (**self).write(key, document)
    }

    fn subscribe(&self, key: &str) -> Result<StoreSubscription, StoreError> {
        (**self).subscribe(key)
    }
}

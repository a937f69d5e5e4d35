//! velolink-store: the shared data store boundary.
//! Provides the `StateStore` trait, key layout helpers, and an in-memory
//! last-write-wins store with push notification. No business logic; the
//! sync engine and command channel consume this boundary.

pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use keys::{command_key, state_key};
pub use memory::MemoryStore;
pub use store::{StateStore, StoreSubscription};

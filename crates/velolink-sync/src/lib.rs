//! velolink-sync: real-time state synchronization for one tracked bike.
//!
//! `engine` is the pure subscription state machine (no IO, clock passed
//! in); `subscriber` is the tokio task that owns the store subscription,
//! the staleness timer, and observer dispatch.

pub mod engine;
pub mod subscriber;

pub use engine::{DegradedReason, SyncConfig, SyncEvent, SyncPhase, SyncTracker};
pub use subscriber::{RetryPolicy, SyncHandle, SyncObserver, spawn_sync};

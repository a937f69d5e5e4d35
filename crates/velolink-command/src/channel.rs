//! CommandChannel: one per client session.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use velolink_core::{Command, CommandKind, InvalidCommand};
use velolink_store::{StateStore, StoreError, command_key};

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Rejected before any store write happened.
    #[error("invalid command: {0}")]
    Invalid(#[from] InvalidCommand),

    /// The store rejected the slot write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─── Acknowledgement ──────────────────────────────────────────────

/// Confirms the command reached the store, nothing more. Execution is
/// correlated via `BikeState::last_command.timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    pub bike_id: String,
    pub timestamp: i64,
}

// ─── Channel ──────────────────────────────────────────────────────

/// Session-scoped dispatcher writing to per-bike command slots.
///
/// Timestamps are strictly monotonic per bike within one channel: two
/// submissions in the same millisecond still increase. The slot is
/// overwritten on each submit, latest-wins.
pub struct CommandChannel<S: StateStore> {
    store: S,
    last_issued: Mutex<HashMap<String, i64>>,
}

impl<S: StateStore> CommandChannel<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, stamp, and write a command to `bike_id`'s slot.
    ///
    /// Validation failures perform no store write.
    pub fn submit(
        &self,
        bike_id: &str,
        kind: CommandKind,
        payload: Option<&str>,
    ) -> Result<CommandAck, CommandError> {
        let timestamp = self.next_timestamp(bike_id)?;
        let command = Command::new(kind, payload, timestamp)?;

        let document = serde_json::to_value(&command)
            .map_err(|e| StoreError::Unavailable(format!("command serialization: {e}")))?;
        self.store.write(&command_key(bike_id), document)?;

        debug!(bike_id, kind = %kind, timestamp, "command submitted");
        Ok(CommandAck {
            bike_id: bike_id.to_string(),
            timestamp,
        })
    }

    fn next_timestamp(&self, bike_id: &str) -> Result<i64, CommandError> {
        let mut last = self
            .last_issued
            .lock()
            .map_err(|_| StoreError::Unavailable("channel mutex poisoned".to_string()))?;
        let now_ms = Utc::now().timestamp_millis();
        let entry = last.entry(bike_id.to_string()).or_insert(0);
        let stamped = now_ms.max(*entry + 1);
        *entry = stamped;
        Ok(stamped)
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use velolink_store::MemoryStore;

    #[test]
    fn submit_writes_to_command_slot() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        let ack = channel
            .submit("bike_001", CommandKind::Lock, None)
            .expect("submit");
        assert_eq!(ack.bike_id, "bike_001");

        let slot = store.get("bikes/bike_001/command").expect("slot written");
        assert_eq!(slot["type"], "LOCK");
        assert_eq!(slot["timestamp"], ack.timestamp);
        assert!(slot.get("payload").is_none());
    }

    #[test]
    fn navigate_carries_destination_payload() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        channel
            .submit("bike_001", CommandKind::Navigate, Some("Hawa Mahal"))
            .expect("submit");

        let slot = store.get("bikes/bike_001/command").expect("slot written");
        assert_eq!(slot["type"], "NAVIGATE");
        assert_eq!(slot["payload"], "Hawa Mahal");
    }

    #[test]
    fn empty_navigate_is_rejected_without_write() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        let err = channel
            .submit("bike_001", CommandKind::Navigate, Some(""))
            .expect_err("should fail");
        assert_eq!(
            err,
            CommandError::Invalid(InvalidCommand::MissingDestination)
        );
        assert_eq!(store.get("bikes/bike_001/command"), None);
    }

    #[test]
    fn timestamps_are_strictly_monotonic_per_bike() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        let mut stamps = Vec::new();
        for _ in 0..10 {
            let ack = channel
                .submit("bike_001", CommandKind::Lock, None)
                .expect("submit");
            stamps.push(ack.timestamp);
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn slot_holds_latest_command_only() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        channel
            .submit("bike_001", CommandKind::Lock, None)
            .expect("submit");
        let ack = channel
            .submit("bike_001", CommandKind::Unlock, None)
            .expect("submit");

        let slot = store.get("bikes/bike_001/command").expect("slot written");
        assert_eq!(slot["type"], "UNLOCK");
        assert_eq!(slot["timestamp"], ack.timestamp);
    }

    #[test]
    fn bikes_stamp_independently() {
        let store = MemoryStore::new();
        let channel = CommandChannel::new(&store);

        let a = channel
            .submit("bike_001", CommandKind::Lock, None)
            .expect("submit");
        let b = channel
            .submit("bike_002", CommandKind::Lock, None)
            .expect("submit");
        // Both stamped from the same clock, neither forced past the other.
        assert!((a.timestamp - b.timestamp).abs() < 1_000);
    }

    #[test]
    fn store_failure_surfaces_as_store_error() {
        struct DownStore;
        impl StateStore for DownStore {
            fn write(&self, _: &str, _: serde_json::Value) -> Result<(), StoreError> {
                Err(StoreError::Unavailable("offline".to_string()))
            }
            fn subscribe(
                &self,
                _: &str,
            ) -> Result<velolink_store::StoreSubscription, StoreError> {
                Err(StoreError::Unavailable("offline".to_string()))
            }
        }

        let channel = CommandChannel::new(DownStore);
        let err = channel
            .submit("bike_001", CommandKind::Lock, None)
            .expect_err("should fail");
        assert!(matches!(err, CommandError::Store(StoreError::Unavailable(_))));
    }
}

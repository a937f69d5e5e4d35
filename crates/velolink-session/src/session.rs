//! BikeSession: the facade the presentation layer drives.
//!
//! One session tracks at most one bike. Replacing the binding tears the
//! old subscription down before the new one opens, so exactly one store
//! subscription is active after the transition. Registered callbacks
//! belong to the session, not the binding, and survive replacement.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::info;

use velolink_command::{CommandAck, CommandChannel, CommandError};
use velolink_core::{BikeState, CommandKind};
use velolink_store::StateStore;
use velolink_sync::{
    DegradedReason, RetryPolicy, SyncConfig, SyncEvent, SyncHandle, SyncObserver, spawn_sync,
};

use crate::resolver::{BindingError, CodeResolver};

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A command was issued with no active binding.
    #[error("no bike is currently tracked")]
    NotTracking,

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

// ─── Observer fan-out ─────────────────────────────────────────────

type StateChangedFn = Box<dyn Fn(&BikeState) + Send + Sync>;
type DegradedFn = Box<dyn Fn(DegradedReason) + Send + Sync>;

/// Session-owned callback registry, shared with the subscriber task.
#[derive(Default)]
struct ObserverSet {
    state_changed: Mutex<Vec<StateChangedFn>>,
    degraded: Mutex<Vec<DegradedFn>>,
}

impl SyncObserver for ObserverSet {
    // Lock poisoning is recovered, not skipped: a callback that panicked
    // mid-delivery must not mute the session for good.
    fn on_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::StateChanged(state) => {
                let callbacks = self
                    .state_changed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                for callback in callbacks.iter() {
                    callback(&state);
                }
            }
            SyncEvent::ConnectionDegraded(reason) => {
                let callbacks = self.degraded.lock().unwrap_or_else(PoisonError::into_inner);
                for callback in callbacks.iter() {
                    callback(reason);
                }
            }
        }
    }
}

// ─── Session ──────────────────────────────────────────────────────

struct ActiveBinding {
    bike_id: String,
    handle: SyncHandle,
}

/// One rider session: resolve a scanned code, track the bike, observe
/// its state, issue commands.
///
/// Must live inside a tokio runtime; tracking spawns the subscriber
/// task.
pub struct BikeSession<S: StateStore + 'static> {
    store: Arc<S>,
    resolver: Box<dyn CodeResolver>,
    channel: CommandChannel<Arc<S>>,
    observers: Arc<ObserverSet>,
    config: SyncConfig,
    retry: RetryPolicy,
    active: Option<ActiveBinding>,
}

impl<S: StateStore + 'static> BikeSession<S> {
    pub fn new(store: Arc<S>, resolver: Box<dyn CodeResolver>) -> Self {
        Self {
            channel: CommandChannel::new(store.clone()),
            store,
            resolver,
            observers: Arc::new(ObserverSet::default()),
            config: SyncConfig::default(),
            retry: RetryPolicy::default(),
            active: None,
        }
    }

    #[must_use]
    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a callback for accepted state changes. Callbacks run on
    /// the subscriber task and survive binding replacement.
    pub fn on_state_changed(&self, callback: impl Fn(&BikeState) + Send + Sync + 'static) {
        self.observers
            .state_changed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Register a callback for degraded-connection events.
    pub fn on_connection_degraded(
        &self,
        callback: impl Fn(DegradedReason) + Send + Sync + 'static,
    ) {
        self.observers
            .degraded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Resolve a scanned code and start tracking the bike it binds to.
    ///
    /// On a resolve error, no subscription is opened and any existing
    /// binding stays untouched.
    pub fn scan(&mut self, scanned_code: &str) -> Result<String, SessionError> {
        let bike_id = self.resolver.resolve(scanned_code)?;
        self.track_bike(&bike_id);
        Ok(bike_id)
    }

    /// Start tracking `bike_id`, replacing any existing binding.
    ///
    /// The old subscription is cancelled before the new one is spawned.
    pub fn track_bike(&mut self, bike_id: &str) {
        if let Some(previous) = self.active.take() {
            info!(from = %previous.bike_id, to = bike_id, "replacing binding");
            previous.handle.cancel();
        } else {
            info!(bike_id, "binding");
        }
        let handle = spawn_sync(
            self.store.clone(),
            bike_id,
            self.config,
            self.retry,
            self.observers.clone() as Arc<dyn SyncObserver>,
        );
        self.active = Some(ActiveBinding {
            bike_id: bike_id.to_string(),
            handle,
        });
    }

    /// Tear down the current binding. Idempotent.
    pub fn stop_tracking(&mut self) {
        if let Some(binding) = self.active.take() {
            info!(bike_id = %binding.bike_id, "unbinding");
            binding.handle.cancel();
        }
    }

    /// Bike this session currently tracks, if any.
    pub fn tracked_bike(&self) -> Option<&str> {
        self.active.as_ref().map(|b| b.bike_id.as_str())
    }

    /// Submit a command to the currently tracked bike.
    ///
    /// The ack confirms the store write only; execution shows up as a
    /// later `lastCommand` in the state stream.
    pub fn issue_command(
        &self,
        kind: CommandKind,
        payload: Option<&str>,
    ) -> Result<CommandAck, SessionError> {
        let binding = self.active.as_ref().ok_or(SessionError::NotTracking)?;
        Ok(self.channel.submit(&binding.bike_id, kind, payload)?)
    }
}

impl<S: StateStore + 'static> Drop for BikeSession<S> {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

// ─── Tests ────────────────────────────────────────────────────────

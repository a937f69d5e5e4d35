//! Tokio subscriber task: owns the store subscription, the staleness
//! timer, and observer dispatch. All FSM decisions are delegated to
//! [`SyncTracker`]; this module only does IO and timing.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use velolink_store::{StateStore, state_key};

use crate::engine::{SyncConfig, SyncEvent, SyncTracker};

// ─── Observer ─────────────────────────────────────────────────────

/// Receives sync events on the subscriber task.
///
/// Callbacks must be quick; they run inline with snapshot processing.
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: SyncEvent);
}

impl<F: Fn(SyncEvent) + Send + Sync> SyncObserver for F {
    fn on_event(&self, event: SyncEvent) {
        self(event)
    }
}

// ─── Retry policy ─────────────────────────────────────────────────

/// Exponential backoff for resubscription after store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): initial, doubled
    /// each attempt, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

// ─── Handle ───────────────────────────────────────────────────────

/// Owner's handle to a running subscriber task.
pub struct SyncHandle {
    gate: Arc<AtomicBool>,
    dispatch_lock: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop the subscriber. No event is delivered after this returns,
    /// even for snapshots already in flight: the gate is flipped first,
    /// then the dispatch lock is taken, which waits out any dispatch
    /// that passed its gate check before the flip.
    pub fn cancel(self) {
        self.gate.store(true, Ordering::SeqCst);
        drop(
            self.dispatch_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.task.abort();
    }
}

// ─── Runner ───────────────────────────────────────────────────────

/// Spawn the subscriber task for one bike.
///
/// The task holds exactly one store subscription at any instant. A
/// failed or closed subscription is retried with `retry` backoff; the
/// tracker reports the outage to the observer once per episode.
pub fn spawn_sync<S>(
    store: S,
    bike_id: &str,
    config: SyncConfig,
    retry: RetryPolicy,
    observer: Arc<dyn SyncObserver>,
) -> SyncHandle
where
    S: StateStore + 'static,
{
    let gate = Arc::new(AtomicBool::new(false));
    let dispatch_lock = Arc::new(Mutex::new(()));
    let tracker = SyncTracker::new(bike_id, config);
    let task = tokio::spawn(run(
        store,
        tracker,
        config,
        retry,
        observer,
        gate.clone(),
        dispatch_lock.clone(),
    ));
    SyncHandle {
        gate,
        dispatch_lock,
        task,
    }
}

async fn run<S: StateStore>(
    store: S,
    mut tracker: SyncTracker,
    config: SyncConfig,
    retry: RetryPolicy,
    observer: Arc<dyn SyncObserver>,
    gate: Arc<AtomicBool>,
    dispatch_lock: Arc<Mutex<()>>,
) {
    let key = state_key(tracker.bike_id());
    let mut attempt = 0u32;

    loop {
        tracker.begin_subscribe();
        let mut sub = match store.subscribe(&key) {
            Ok(sub) => {
                info!(key, "subscribed");
                attempt = 0;
                sub
            }
            Err(e) => {
                warn!(key, error = %e, "subscribe failed");
                if let Some(event) = tracker.on_store_unavailable()
                    && !dispatch(&gate, &dispatch_lock, observer.as_ref(), event)
                {
                    return;
                }
                let delay = retry.delay(attempt);
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let stale = tokio::time::sleep(config.stale_after);
        tokio::pin!(stale);

        loop {
            tokio::select! {
                snapshot = sub.next() => match snapshot {
                    Some(raw) => {
                        stale.as_mut().reset(Instant::now() + config.stale_after);
                        for event in tracker.on_snapshot(&raw, Utc::now()) {
                            if !dispatch(&gate, &dispatch_lock, observer.as_ref(), event) {
                                return;
                            }
                        }
                    }
                    None => {
                        warn!(key, "subscription closed by store");
                        if let Some(event) = tracker.on_store_unavailable()
                            && !dispatch(&gate, &dispatch_lock, observer.as_ref(), event)
                        {
                            return;
                        }
                        break;
                    }
                },
                () = stale.as_mut() => {
                    if let Some(event) = tracker.mark_stale() {
                        warn!(key, "no snapshot within stale window");
                        if !dispatch(&gate, &dispatch_lock, observer.as_ref(), event) {
                            return;
                        }
                    }
                    stale.as_mut().reset(Instant::now() + config.stale_after);
                }
            }
        }

        // Closed stream: resubscribe after backoff, same path as a
        // failed subscribe.
        let delay = retry.delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(delay).await;
    }
}

/// Deliver one event unless the handle was cancelled. Returns `false`
/// when the task should stop.
///
/// The gate check and the callback run under the dispatch lock, the
/// same lock `cancel()` takes after flipping the gate. A panicking
/// callback is contained here; it must not kill the subscriber.
fn dispatch(
    gate: &AtomicBool,
    lock: &Mutex<()>,
    observer: &dyn SyncObserver,
    event: SyncEvent,
) -> bool {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    if gate.load(Ordering::SeqCst) {
        return false;
    }
    debug!(?event, "dispatching");
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
        warn!(detail = panic_message(&panic), "observer callback panicked");
    }
    true
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ─── Tests ────────────────────────────────────────────────────────

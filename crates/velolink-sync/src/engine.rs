//! Subscription state machine, one per tracked bike.
//!
//! Pure and side-effect-free: the clock is passed in, IO lives in
//! [`crate::subscriber`]. Phases:
//!
//! ```text
//! Unsubscribed -> Subscribing -> Live <-> Stale
//!       ^                          |
//!       +----------- reset() -----+
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use velolink_core::{BikeState, parse_state};

// ─── Constants ────────────────────────────────────────────────────

/// Default snapshot silence tolerated before a session is marked stale.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 30;

// ─── Types ────────────────────────────────────────────────────────

/// Where a tracked bike sits in its subscription lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    #[default]
    Unsubscribed,
    Subscribing,
    Live,
    Stale,
}

/// Why the connection is considered degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// No snapshot within the stale window; the store link may be fine.
    Stale,
    /// The store itself rejected or dropped the subscription.
    StoreUnavailable,
}

/// Events surfaced to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The parsed state differs from the last observed state.
    StateChanged(BikeState),
    /// Liveness lost; emitted once per episode.
    ConnectionDegraded(DegradedReason),
}

/// Tunables for the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Snapshot silence tolerated while Live before going Stale.
    pub stale_after: std::time::Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after: std::time::Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

// ─── Tracker ──────────────────────────────────────────────────────

/// Per-bike subscription tracker.
///
/// Duplicate snapshots are suppressed by value equality against the last
/// observed state; unparseable snapshots are dropped without a phase
/// change. The cached state survives resubscription after an outage, so
/// a re-delivered snapshot does not re-emit.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    bike_id: String,
    config: SyncConfig,
    phase: SyncPhase,
    last_state: Option<BikeState>,
    last_snapshot_at: Option<DateTime<Utc>>,
    outage_reported: bool,
}

impl SyncTracker {
    pub fn new(bike_id: impl Into<String>, config: SyncConfig) -> Self {
        Self {
            bike_id: bike_id.into(),
            config,
            phase: SyncPhase::Unsubscribed,
            last_state: None,
            last_snapshot_at: None,
            outage_reported: false,
        }
    }

    pub fn bike_id(&self) -> &str {
        &self.bike_id
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Last observed state, if any snapshot has been accepted.
    pub fn state(&self) -> Option<&BikeState> {
        self.last_state.as_ref()
    }

    /// A subscription attempt is starting. Cached state is kept so that
    /// duplicate suppression holds across reconnects.
    pub fn begin_subscribe(&mut self) {
        self.phase = SyncPhase::Subscribing;
    }

    /// A snapshot arrived for this bike's state key.
    ///
    /// Returns the events to dispatch, in order. The first accepted
    /// snapshot moves Subscribing to Live; a snapshot while Stale
    /// returns to Live without resubscribing.
    pub fn on_snapshot(&mut self, raw: &Value, now: DateTime<Utc>) -> Vec<SyncEvent> {
        if self.phase == SyncPhase::Unsubscribed {
            return Vec::new();
        }
        let parsed = match parse_state(&self.bike_id, raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(bike_id = %self.bike_id, error = %e, "dropping unparseable snapshot");
                return Vec::new();
            }
        };
        for warning in &parsed.warnings {
            warn!(bike_id = %self.bike_id, ?warning, "recovered malformed state field");
        }

        self.phase = SyncPhase::Live;
        self.last_snapshot_at = Some(now);
        self.outage_reported = false;

        if self.last_state.as_ref() == Some(&parsed.state) {
            return Vec::new();
        }
        self.last_state = Some(parsed.state.clone());
        vec![SyncEvent::StateChanged(parsed.state)]
    }

    /// The stale window elapsed with no snapshot. Driven by the runner's
    /// timer; only a Live session degrades, so each silence episode
    /// emits at most one event.
    pub fn mark_stale(&mut self) -> Option<SyncEvent> {
        if self.phase != SyncPhase::Live {
            return None;
        }
        self.phase = SyncPhase::Stale;
        Some(SyncEvent::ConnectionDegraded(DegradedReason::Stale))
    }

    /// Clock-based staleness check for callers without a timer.
    pub fn check_stale(&mut self, now: DateTime<Utc>) -> Option<SyncEvent> {
        if self.phase != SyncPhase::Live {
            return None;
        }
        let elapsed = self
            .last_snapshot_at
            .map(|at| now - at)
            .and_then(|d| d.to_std().ok());
        match elapsed {
            Some(silence) if silence >= self.config.stale_after => self.mark_stale(),
            _ => None,
        }
    }

    /// The store rejected or dropped the subscription. Emits once per
    /// outage; cleared by the next accepted snapshot.
    pub fn on_store_unavailable(&mut self) -> Option<SyncEvent> {
        self.phase = SyncPhase::Subscribing;
        if self.outage_reported {
            return None;
        }
        self.outage_reported = true;
        Some(SyncEvent::ConnectionDegraded(DegradedReason::StoreUnavailable))
    }

    /// Tear down: back to Unsubscribed, cached state discarded.
    /// Idempotent.
    pub fn reset(&mut self) {
        self.phase = SyncPhase::Unsubscribed;
        self.last_state = None;
        self.last_snapshot_at = None;
        self.outage_reported = false;
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use velolink_core::BikeStatus;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn tracker() -> SyncTracker {
        SyncTracker::new("bike_001", SyncConfig::default())
    }

    // 1. Lifecycle

    #[test]
    fn initial_phase_is_unsubscribed() {
        let t = tracker();
        assert_eq!(t.phase(), SyncPhase::Unsubscribed);
        assert!(t.state().is_none());
    }

    #[test]
    fn subscribe_then_first_snapshot_goes_live() {
        let mut t = tracker();
        t.begin_subscribe();
        assert_eq!(t.phase(), SyncPhase::Subscribing);

        let events = t.on_snapshot(
            &json!({"status": "online", "battery": 42, "isLocked": true}),
            ts("2026-08-29T10:00:00Z"),
        );
        assert_eq!(t.phase(), SyncPhase::Live);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SyncEvent::StateChanged(state) => {
                assert_eq!(state.status, BikeStatus::Online);
                assert_eq!(state.battery, Some(42));
                assert!(state.is_locked);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn snapshot_while_unsubscribed_is_ignored() {
        let mut t = tracker();
        let events = t.on_snapshot(&json!({"status": "online"}), ts("2026-08-29T10:00:00Z"));
        assert!(events.is_empty());
        assert_eq!(t.phase(), SyncPhase::Unsubscribed);
    }

    #[test]
    fn reset_is_idempotent_and_discards_state() {
        let mut t = tracker();
        t.begin_subscribe();
        t.on_snapshot(&json!({"status": "online"}), ts("2026-08-29T10:00:00Z"));
        assert!(t.state().is_some());

        t.reset();
        assert_eq!(t.phase(), SyncPhase::Unsubscribed);
        assert!(t.state().is_none());
        t.reset();
        assert_eq!(t.phase(), SyncPhase::Unsubscribed);
    }

    // 2. Duplicate suppression

    #[test]
    fn identical_snapshot_emits_nothing() {
        let mut t = tracker();
        t.begin_subscribe();
        let doc = json!({"status": "online", "battery": 42});

        let first = t.on_snapshot(&doc, ts("2026-08-29T10:00:00Z"));
        assert_eq!(first.len(), 1);
        let second = t.on_snapshot(&doc, ts("2026-08-29T10:00:05Z"));
        assert!(second.is_empty());
    }

    #[test]
    fn changed_snapshot_emits_again() {
        let mut t = tracker();
        t.begin_subscribe();
        t.on_snapshot(&json!({"battery": 42}), ts("2026-08-29T10:00:00Z"));
        let events = t.on_snapshot(&json!({"battery": 41}), ts("2026-08-29T10:00:05Z"));
        assert_eq!(events.len(), 1);
    }

    // 3. Staleness

    #[test]
    fn silence_past_window_goes_stale_once() {
        let mut t = tracker();
        t.begin_subscribe();
        t.on_snapshot(&json!({"status": "online"}), ts("2026-08-29T10:00:00Z"));

        assert!(t.check_stale(ts("2026-08-29T10:00:29Z")).is_none());
        let event = t.check_stale(ts("2026-08-29T10:00:30Z"));
        assert_eq!(
            event,
            Some(SyncEvent::ConnectionDegraded(DegradedReason::Stale))
        );
        assert_eq!(t.phase(), SyncPhase::Stale);

        // Second check in the same episode stays quiet.
        assert!(t.check_stale(ts("2026-08-29T10:05:00Z")).is_none());
    }

    #[test]
    fn snapshot_while_stale_returns_to_live() {
        let mut t = tracker();
        t.begin_subscribe();
        t.on_snapshot(&json!({"battery": 42}), ts("2026-08-29T10:00:00Z"));
        t.check_stale(ts("2026-08-29T10:01:00Z"));
        assert_eq!(t.phase(), SyncPhase::Stale);

        let events = t.on_snapshot(&json!({"battery": 41}), ts("2026-08-29T10:02:00Z"));
        assert_eq!(t.phase(), SyncPhase::Live);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn stale_then_recover_then_stale_emits_per_episode() {
        let mut t = tracker();
        t.begin_subscribe();
        t.on_snapshot(&json!({"battery": 42}), ts("2026-08-29T10:00:00Z"));
        assert!(t.check_stale(ts("2026-08-29T10:01:00Z")).is_some());
        t.on_snapshot(&json!({"battery": 41}), ts("2026-08-29T10:02:00Z"));
        assert!(t.check_stale(ts("2026-08-29T10:03:00Z")).is_some());
    }

    #[test]
    fn mark_stale_only_degrades_a_live_session() {
        let mut t = tracker();
        assert!(t.mark_stale().is_none());
        t.begin_subscribe();
        assert!(t.mark_stale().is_none());
    }

    #[test]
    fn custom_stale_window_is_honored() {
        let mut t = SyncTracker::new(
            "bike_001",
            SyncConfig {
                stale_after: std::time::Duration::from_secs(5),
            },
        );
        t.begin_subscribe();
        t.on_snapshot(&json!({"battery": 42}), ts("2026-08-29T10:00:00Z"));
        assert!(t.check_stale(ts("2026-08-29T10:00:04Z")).is_none());
        assert!(t.check_stale(ts("2026-08-29T10:00:05Z")).is_some());
    }

    // 4. Malformed snapshots

    #[test]
    fn unparseable_snapshot_is_dropped_without_phase_change() {
        let mut t = tracker();
        t.begin_subscribe();
        let events = t.on_snapshot(&json!("not an object"), ts("2026-08-29T10:00:00Z"));
        assert!(events.is_empty());
        assert_eq!(t.phase(), SyncPhase::Subscribing);
    }

    #[test]
    fn recovered_fields_still_produce_state() {
        let mut t = tracker();
        t.begin_subscribe();
        let events = t.on_snapshot(
            &json!({"status": "online", "battery": 150}),
            ts("2026-08-29T10:00:00Z"),
        );
        match &events[0] {
            SyncEvent::StateChanged(state) => assert_eq!(state.battery, Some(100)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // 5. Store outages

    #[test]
    fn store_outage_reported_once_until_next_snapshot() {
        let mut t = tracker();
        t.begin_subscribe();
        assert_eq!(
            t.on_store_unavailable(),
            Some(SyncEvent::ConnectionDegraded(DegradedReason::StoreUnavailable))
        );
        assert!(t.on_store_unavailable().is_none());

        t.on_snapshot(&json!({"battery": 42}), ts("2026-08-29T10:00:00Z"));
        assert!(t.on_store_unavailable().is_some());
    }

    #[test]
    fn cached_state_survives_resubscribe() {
        let mut t = tracker();
        t.begin_subscribe();
        let doc = json!({"battery": 42});
        t.on_snapshot(&doc, ts("2026-08-29T10:00:00Z"));

        t.on_store_unavailable();
        t.begin_subscribe();
        // Re-delivered snapshot after reconnect: no duplicate event.
        let events = t.on_snapshot(&doc, ts("2026-08-29T10:00:10Z"));
        assert!(events.is_empty());
        assert_eq!(t.phase(), SyncPhase::Live);
    }
}

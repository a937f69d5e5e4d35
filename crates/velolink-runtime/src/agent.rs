//! Simulated bike agent for the demo runtime.
//!
//! Plays the device side of the protocol: publishes heartbeat state,
//! watches the command slot, executes commands, and mirrors the last
//! executed command into the state document. The real agent runs on the
//! bike and is out of scope.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use velolink_core::{BikeState, BikeStatus, Command, CommandKind, Location};
use velolink_store::{StateStore, command_key, state_key};

pub struct AgentConfig {
    pub bike_id: String,
    pub heartbeat: Duration,
}

/// Spawn the agent task. Runs until aborted.
pub fn spawn_agent<S: StateStore + 'static>(store: S, config: AgentConfig) -> JoinHandle<()> {
    tokio::spawn(run(store, config))
}

async fn run<S: StateStore>(store: S, config: AgentConfig) {
    let mut state = BikeState {
        bike_id: config.bike_id.clone(),
        location: Some(Location {
            latitude: 26.9124,
            longitude: 75.7873,
        }),
        status: BikeStatus::Online,
        is_locked: true,
        battery: Some(100),
        last_command: None,
    };
    publish(&store, &state);

    let mut commands = match store.subscribe(&command_key(&config.bike_id)) {
        Ok(sub) => sub,
        Err(e) => {
            warn!(bike_id = %config.bike_id, error = %e, "agent cannot watch command slot");
            return;
        }
    };
    let mut executed_up_to = 0i64;
    let mut heartbeat = tokio::time::interval(config.heartbeat);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                drain(&mut state);
                drift(&mut state);
                publish(&store, &state);
            }
            slot = commands.next() => {
                let Some(raw) = slot else {
                    warn!(bike_id = %config.bike_id, "command slot subscription closed");
                    return;
                };
                let command: Command = match serde_json::from_value(raw) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!(bike_id = %config.bike_id, error = %e, "ignoring malformed command");
                        continue;
                    }
                };
                // The slot is latest-wins; a re-delivered or stale
                // command is skipped by timestamp.
                if command.timestamp <= executed_up_to {
                    continue;
                }
                executed_up_to = command.timestamp;
                execute(&mut state, command);
                publish(&store, &state);
            }
        }
    }
}

fn execute(state: &mut BikeState, command: Command) {
    info!(bike_id = %state.bike_id, kind = %command.kind, "executing command");
    match command.kind {
        CommandKind::Lock => state.is_locked = true,
        CommandKind::Unlock => state.is_locked = false,
        CommandKind::Navigate => {
            if let Some(destination) = &command.payload {
                info!(bike_id = %state.bike_id, destination, "navigation started");
            }
        }
        // `CommandKind` is `#[non_exhaustive]`; all current variants are
        // handled above, so this arm is unreachable today.
        _ => {}
    }
    state.last_command = Some(command);
}

/// Battery drains one percent per heartbeat, bottoming out at zero.
fn drain(state: &mut BikeState) {
    if let Some(battery) = state.battery {
        state.battery = Some(battery.saturating_sub(1));
    }
}

/// Small northward drift so state changes are visible in the demo.
fn drift(state: &mut BikeState) {
    if let Some(location) = &mut state.location {
        location.latitude += 0.0001;
    }
}

fn publish<S: StateStore>(store: &S, state: &BikeState) {
    let document = match serde_json::to_value(state) {
        Ok(document) => document,
        Err(e) => {
            warn!(bike_id = %state.bike_id, error = %e, "state serialization failed");
            return;
        }
    };
    if let Err(e) = store.write(&state_key(&state.bike_id), document) {
        warn!(bike_id = %state.bike_id, error = %e, "state publish failed");
    }
}

// ─── Tests ────────────────────────────────────────────────────────

//! Self-contained demo loop: one simulated bike, one rider session,
//! everything over an in-process store. Exercises the full protocol
//! path scan -> observe -> command -> acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use velolink_core::CommandKind;
use velolink_session::{BikeSession, DirectResolver, SyncConfig};
use velolink_store::MemoryStore;

use crate::agent::{AgentConfig, spawn_agent};
use crate::cli::DemoOpts;

pub async fn run(opts: DemoOpts) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let agent = spawn_agent(
        store.clone(),
        AgentConfig {
            bike_id: opts.bike.clone(),
            heartbeat: Duration::from_millis(opts.heartbeat_ms),
        },
    );

    let mut session = BikeSession::new(store, Box::new(DirectResolver)).with_sync_config(
        SyncConfig {
            stale_after: Duration::from_secs(opts.stale_after_secs),
        },
    );
    session.on_state_changed(|state| {
        info!(
            bike_id = %state.bike_id,
            status = %state.status,
            locked = state.is_locked,
            battery = ?state.battery,
            "state"
        );
    });
    session.on_connection_degraded(|reason| {
        warn!(?reason, "connection degraded");
    });

    let bike_id = session.scan(&opts.bike)?;
    info!(bike_id, "tracking");

    let script = async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.issue_command(CommandKind::Unlock, None)?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        session.issue_command(CommandKind::Navigate, Some("Hawa Mahal"))?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        session.issue_command(CommandKind::Lock, None)?;
        tokio::time::sleep(Duration::from_secs(
            opts.duration_secs.saturating_sub(8),
        ))
        .await;
        Ok::<(), anyhow::Error>(())
    };

    tokio::select! {
        result = script => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    agent.abort();
    Ok(())
}

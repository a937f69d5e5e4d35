use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ─── Bike Status ──────────────────────────────────────────────────

/// Connectivity status derived from agent heartbeat presence.
///
/// Never client-set: an absent or unrecognized value on the wire is
/// treated as [`BikeStatus::Offline`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeStatus {
    Online,
    #[default]
    Offline,
}

impl BikeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for BikeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Location ─────────────────────────────────────────────────────

/// GPS fix in decimal degrees. Absent from [`BikeState`] until the
/// agent reports its first fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

// ─── Command ──────────────────────────────────────────────────────

/// Command types a client session may place into a bike's command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum CommandKind {
    Navigate,
    Lock,
    Unlock,
}

impl CommandKind {
    pub const ALL: [Self; 3] = [Self::Navigate, Self::Lock, Self::Unlock];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "NAVIGATE",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = InvalidCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NAVIGATE" => Ok(Self::Navigate),
            "LOCK" => Ok(Self::Lock),
            "UNLOCK" => Ok(Self::Unlock),
            _ => Err(InvalidCommand::UnknownKind(s.to_string())),
        }
    }
}

/// A command written to a bike's command slot.
///
/// One active slot per bike, overwritten on each new command. The slot
/// is latest-wins, never a queue. The agent uses `timestamp` to detect
/// duplicate or stale commands; clients compare it against
/// `BikeState::last_command` to correlate acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    /// Destination text; only meaningful for NAVIGATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Issue time, milliseconds since epoch. Strictly monotonic per
    /// session per bike.
    pub timestamp: i64,
}

impl Command {
    /// Build a validated command. NAVIGATE requires a non-empty payload;
    /// LOCK/UNLOCK ignore the payload and drop it from the wire form.
    pub fn new(
        kind: CommandKind,
        payload: Option<&str>,
        timestamp: i64,
    ) -> Result<Self, InvalidCommand> {
        let payload = match kind {
            CommandKind::Navigate => match payload.map(str::trim) {
                Some(dest) if !dest.is_empty() => Some(dest.to_string()),
                _ => return Err(InvalidCommand::MissingDestination),
            },
            CommandKind::Lock | CommandKind::Unlock => None,
        };
        Ok(Self {
            kind,
            payload,
            timestamp,
        })
    }
}

/// Command shape violations. Surfaced to the caller before any store
/// write happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCommand {
    #[error("unknown command type: {0}")]
    UnknownKind(String),
    #[error("NAVIGATE requires a non-empty destination")]
    MissingDestination,
}

// ─── Bike State ───────────────────────────────────────────────────

/// Canonical published state of one bike.
///
/// The bike agent is the sole writer of `status`, `location`, `battery`
/// and `is_locked`; client sessions only ever write the command slot.
/// `last_command` is denormalized by the agent for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeState {
    pub bike_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: BikeStatus,
    #[serde(default)]
    pub is_locked: bool,
    /// Charge percentage 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<Command>,
}

impl BikeState {
    /// Empty state for a bike that has not published anything yet.
    pub fn offline(bike_id: impl Into<String>) -> Self {
        Self {
            bike_id: bike_id.into(),
            location: None,
            status: BikeStatus::Offline,
            is_locked: false,
            battery: None,
            last_command: None,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

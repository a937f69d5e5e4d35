//! Tolerant parsing of raw state documents into [`BikeState`].
//!
//! Telemetry glitches are common and must never break the rider's view:
//! field-level problems clamp or default and are reported as warnings,
//! not errors. The only fatal shape is a document that is not a JSON
//! object at all.

use serde_json::Value;
use thiserror::Error;

use crate::types::{BikeState, BikeStatus, Command, CommandKind, Location};

// ─── Errors & Warnings ────────────────────────────────────────────

/// Fatal parse failure: the snapshot carries nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("state document is not an object")]
    NotAnObject,
}

/// Non-fatal irregularities recovered during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// `battery` was outside [0, 100] and has been clamped.
    BatteryOutOfRange { raw: i64 },
    /// A known field carried an unusable type and was defaulted.
    FieldTypeMismatch { field: &'static str },
    /// `status` carried an unrecognized value; treated as offline.
    UnknownStatus { raw: String },
    /// `lastCommand` was present but not a valid command document.
    MalformedLastCommand,
}

/// Best-effort parse result: the state plus any recovered irregularities.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedState {
    pub state: BikeState,
    pub warnings: Vec<ValidationWarning>,
}

// ─── Parsing ──────────────────────────────────────────────────────

/// Parse a raw store document into a [`BikeState`].
///
/// Pure and deterministic: parsing the same document twice yields equal
/// results. Unknown fields are ignored for forward compatibility. An
/// absent `status` means [`BikeStatus::Offline`]; `battery` outside
/// [0, 100] is clamped and flagged.
pub fn parse_state(bike_id: &str, raw: &Value) -> Result<ParsedState, ValidationError> {
    let doc = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    let mut warnings = Vec::new();

    let status = match doc.get("status") {
        None | Some(Value::Null) => BikeStatus::Offline,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("online") => BikeStatus::Online,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("offline") => BikeStatus::Offline,
        Some(Value::String(s)) => {
            warnings.push(ValidationWarning::UnknownStatus { raw: s.clone() });
            BikeStatus::Offline
        }
        Some(_) => {
            warnings.push(ValidationWarning::FieldTypeMismatch { field: "status" });
            BikeStatus::Offline
        }
    };

    let is_locked = match doc.get("isLocked") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            warnings.push(ValidationWarning::FieldTypeMismatch { field: "isLocked" });
            false
        }
    };

    let battery = parse_battery(doc.get("battery"), &mut warnings);
    let location = parse_location(doc.get("location"), &mut warnings);
    let last_command = parse_last_command(doc.get("lastCommand"), &mut warnings);

    Ok(ParsedState {
        state: BikeState {
            bike_id: bike_id.to_string(),
            location,
            status,
            is_locked,
            battery,
            last_command,
        },
        warnings,
    })
}

fn parse_battery(raw: Option<&Value>, warnings: &mut Vec<ValidationWarning>) -> Option<u8> {
    match raw {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(pct) if (0..=100).contains(&pct) => Some(pct as u8),
            Some(pct) => {
                warnings.push(ValidationWarning::BatteryOutOfRange { raw: pct });
                Some(pct.clamp(0, 100) as u8)
            }
            None => {
                warnings.push(ValidationWarning::FieldTypeMismatch { field: "battery" });
                None
            }
        },
    }
}

fn parse_location(raw: Option<&Value>, warnings: &mut Vec<ValidationWarning>) -> Option<Location> {
    match raw {
        None | Some(Value::Null) => None,
        Some(value) => {
            let fix = value.as_object().and_then(|obj| {
                Some(Location {
                    latitude: obj.get("latitude")?.as_f64()?,
                    longitude: obj.get("longitude")?.as_f64()?,
                })
            });
            if fix.is_none() {
                warnings.push(ValidationWarning::FieldTypeMismatch { field: "location" });
            }
            fix
        }
    }
}

fn parse_last_command(
    raw: Option<&Value>,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<Command> {
    match raw {
        None | Some(Value::Null) => None,
        Some(value) => {
            let cmd = value.as_object().and_then(|obj| {
                let kind = obj
                    .get("type")?
                    .as_str()?
                    .parse::<CommandKind>()
                    .ok()?;
                let payload = obj
                    .get("payload")
                    .and_then(Value::as_str)
                    .map(String::from);
                let timestamp = obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
                Some(Command {
                    kind,
                    payload,
                    timestamp,
                })
            });
            if cmd.is_none() {
                warnings.push(ValidationWarning::MalformedLastCommand);
            }
            cmd
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

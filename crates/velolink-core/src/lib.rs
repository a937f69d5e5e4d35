//! velolink-core: canonical bike state schema and command model.
//! Pure validation and transformation; no IO, no store access.

pub mod state;
pub mod types;

pub use state::{ParsedState, ValidationError, ValidationWarning, parse_state};
pub use types::{BikeState, BikeStatus, Command, CommandKind, InvalidCommand, Location};

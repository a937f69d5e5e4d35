//! Key layout for bike documents.
//!
//! The state document and the command slot live under disjoint keys, so
//! the bike agent and client sessions never write the same key:
//!
//! ```text
//! bikes/{bikeId}            state document, agent-written
//! bikes/{bikeId}/command    command slot, session-written
//! ```

/// Key of a bike's state document.
pub fn state_key(bike_id: &str) -> String {
    format!("bikes/{bike_id}")
}

/// Key of a bike's command slot.
pub fn command_key(bike_id: &str) -> String {
    format!("bikes/{bike_id}/command")
}

//! velolink-command: fire-and-forget command dispatch.
//! Validates commands, assigns per-bike monotonic timestamps, and writes
//! them to the bike's command slot. The ack confirms the store write
//! only; execution is observed through the sync engine.

pub mod channel;

pub use channel::{CommandAck, CommandChannel, CommandError};

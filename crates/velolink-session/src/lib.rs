//! velolink-session: scanned-code resolution and the session facade.
//! The only entry point the presentation layer talks to. Enforces the
//! one-binding-per-session rule and fans sync events out to registered
//! callbacks.

pub mod resolver;
pub mod session;

pub use resolver::{BindingError, CodeResolver, DirectResolver, TableResolver};
pub use session::{BikeSession, SessionError};

// Re-exported so facade consumers do not need a direct sync dependency.
pub use velolink_sync::{DegradedReason, RetryPolicy, SyncConfig};

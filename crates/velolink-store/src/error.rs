//! Error types for the store boundary.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store rejected the operation or could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store shut down and will deliver no further snapshots.
    #[error("store closed")]
    Closed,
}

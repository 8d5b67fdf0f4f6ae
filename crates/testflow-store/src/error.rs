//! Store error types.

use thiserror::Error;

/// Errors raised by the execution store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open the database.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// A statement failed.
    #[error("database query failed: {0}")]
    Query(String),

    /// No row for the given execution ID.
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    /// Attempted to move an execution out of a terminal status.
    #[error("invalid status transition for execution {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
}

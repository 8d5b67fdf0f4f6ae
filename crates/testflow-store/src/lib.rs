//! SQLite persistence for testflow.
//!
//! One [`ExecutionStore`] wraps a `tokio_rusqlite` connection and owns the
//! four tables of the execution history: `executions`, `steps`, `artifacts`,
//! and `requirements`. Child rows cascade on execution deletion; files on
//! disk are never touched by this crate.

mod error;
mod schema;
mod store;

pub use error::StoreError;
pub use store::{ExecutionStats, ExecutionStore, FrameworkStats};

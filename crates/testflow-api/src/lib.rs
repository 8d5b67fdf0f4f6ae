//! HTTP and WebSocket interface for testflow.
//!
//! Exposes run control (`/api/automation/*`), execution history
//! (`/api/test-results*`), artifact retrieval (`/api/artifacts/*`), a health
//! probe, and a WebSocket endpoint streaming per-execution progress.

pub mod error;
pub mod http;
pub mod runner;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use server::{ApiServer, ServerConfig};
pub use state::AppState;

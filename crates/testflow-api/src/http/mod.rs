//! HTTP handlers and routing.

pub mod artifacts;
pub mod automation;
pub mod monitoring;
pub mod results;
pub mod routes;

pub use routes::create_router;

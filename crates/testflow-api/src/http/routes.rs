//! HTTP route definitions.
//!
//! ```text
//! /api/automation
//!   POST /api/automation/run            - Start a run
//!   GET  /api/automation/status/{id}    - Poll run status
//!   POST /api/automation/stop/{id}      - Cancel a run
//!   GET  /api/automation/frameworks     - Supported frameworks
//!
//! /api/test-results
//!   GET    /api/test-results            - List executions (limit/offset)
//!   GET    /api/test-results/stats      - Aggregate statistics
//!   GET    /api/test-results/{id}       - Execution detail
//!   DELETE /api/test-results/{id}       - Delete execution (cascade)
//!
//! /api/artifacts
//!   GET /api/artifacts/{id}/report                      - HTML report inline
//!   GET /api/artifacts/{id}/screenshots                 - List screenshots
//!   GET /api/artifacts/{id}/screenshots/{screenshot_id} - One screenshot inline
//!   GET /api/artifacts/{id}/{kind}                      - Newest artifact of kind, inline
//!   GET /api/artifacts/{id}/{kind}/download             - Same, attachment disposition
//!
//! /health  - Health probe
//! /ws      - WebSocket connection
//! ```

use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    routing::post,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::reveal_error_details;
use crate::http::{artifacts, automation, monitoring, results};
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the main router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/automation/run", post(automation::run_automation))
        .route(
            "/api/automation/status/{id}",
            get(automation::automation_status),
        )
        .route("/api/automation/stop/{id}", post(automation::stop_automation))
        .route("/api/automation/frameworks", get(automation::list_frameworks))
        .route("/api/test-results", get(results::list_test_results))
        .route("/api/test-results/stats", get(results::stats))
        .route(
            "/api/test-results/{id}",
            get(results::get_test_result).delete(results::delete_test_result),
        )
        .route("/api/artifacts/{id}/report", get(artifacts::get_report))
        .route(
            "/api/artifacts/{id}/screenshots",
            get(artifacts::list_screenshots),
        )
        .route(
            "/api/artifacts/{id}/screenshots/{screenshot_id}",
            get(artifacts::get_screenshot),
        )
        .route("/api/artifacts/{id}/{kind}", get(artifacts::get_by_kind))
        .route(
            "/api/artifacts/{id}/{kind}/download",
            get(artifacts::download_by_kind),
        )
        .route("/health", get(monitoring::health))
        .route("/ws", get(ws_handler))
        .layer(middleware::map_response_with_state(
            state.clone(),
            reveal_error_details,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

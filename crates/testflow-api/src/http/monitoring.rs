//! Health probe.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check with storage reachability and load indicators.
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (db_ok, stored_executions) = match state.store.stats().await {
        Ok(stats) => (true, Some(stats.total)),
        Err(_) => (false, None),
    };

    let status = if db_ok { "ok" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": status,
        "uptime_seconds": state.uptime().as_secs(),
        "requests": state.request_count(),
        "running_executions": state.running_count(),
        "ws_subscriptions": state.hub.subscribed_executions(),
        "database": {
            "reachable": db_ok,
            "executions": stored_executions,
        },
        "production": state.config.server.production,
    });

    (code, Json(body))
}

//! Execution history handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List executions, newest first.
///
/// GET /api/test-results
pub async fn list_test_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    state.increment_requests();

    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);
    let executions = state.store.list_executions(limit, offset).await?;

    Ok(Json(json!({
        "count": executions.len(),
        "executions": executions,
    })))
}

/// One execution with its steps, artifacts, and requirement mappings.
///
/// GET /api/test-results/{id}
pub async fn get_test_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.increment_requests();

    let execution = state
        .store
        .get_execution(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "execution",
            id: id.clone(),
        })?;

    let steps = state.store.steps_for(&id).await?;
    let artifacts = state.store.artifacts_for(&id).await?;
    let requirements = state.store.requirements_for(&id).await?;

    Ok(Json(json!({
        "execution": execution,
        "steps": steps,
        "artifacts": artifacts,
        "requirements": requirements,
    })))
}

/// Delete an execution. Steps, artifacts, and requirements cascade; files
/// on disk are left in place.
///
/// DELETE /api/test-results/{id}
pub async fn delete_test_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.increment_requests();

    if !state.store.delete_execution(&id).await? {
        return Err(ApiError::NotFound {
            resource: "execution",
            id,
        });
    }

    info!(execution = %id, "execution deleted");
    Ok(Json(json!({ "deleted": true, "executionId": id })))
}

/// Aggregate statistics.
///
/// GET /api/test-results/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.increment_requests();
    let stats = state.store.stats().await?;
    Ok(Json(json!({ "stats": stats })))
}

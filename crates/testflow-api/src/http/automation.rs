//! Run control handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use testflow_core::{
    CoverageStatus, Execution, Framework, RequirementMapping, RunOptions,
};

use crate::error::ApiError;
use crate::runner::spawn_execution;
use crate::state::AppState;

/// Run options as sent by clients.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OptionsPayload {
    headless: Option<bool>,
    viewport: Option<ViewportPayload>,
    timeout: Option<u64>,
    slow_mo: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ViewportPayload {
    width: u32,
    height: u32,
}

impl OptionsPayload {
    fn into_run_options(self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            headless: self.headless.unwrap_or(defaults.headless),
            viewport_width: self
                .viewport
                .as_ref()
                .map(|v| v.width)
                .unwrap_or(defaults.viewport_width),
            viewport_height: self
                .viewport
                .as_ref()
                .map(|v| v.height)
                .unwrap_or(defaults.viewport_height),
            timeout_ms: self.timeout.unwrap_or(defaults.timeout_ms),
            slow_mo_ms: self.slow_mo.unwrap_or(defaults.slow_mo_ms),
        }
    }
}

/// Requirement mapping as sent by clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequirementPayload {
    requirement_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    coverage: Option<CoverageStatus>,
}

/// Start an automation run.
///
/// POST /api/automation/run
///
/// The body is validated field by field so malformed requests get an
/// explanatory 400 instead of a generic deserialization rejection, and no
/// execution row is created for them.
pub async fn run_automation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    state.increment_requests();

    let task = match body.get("task") {
        Some(Value::String(task)) if !task.trim().is_empty() => task.trim().to_string(),
        Some(Value::String(_)) => {
            return Err(ApiError::BadRequest("task must not be empty".to_string()))
        }
        Some(_) => return Err(ApiError::BadRequest("task must be a string".to_string())),
        None => return Err(ApiError::BadRequest("task is required".to_string())),
    };

    let framework = match body.get("framework") {
        None | Some(Value::Null) => Framework::Playwright,
        Some(Value::String(name)) => Framework::from_str(name).map_err(|_| {
            ApiError::BadRequest(format!(
                "unsupported framework {:?}; supported: playwright, puppeteer",
                name
            ))
        })?,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "framework must be a string".to_string(),
            ))
        }
    };

    let options = match body.get("options") {
        None | Some(Value::Null) => RunOptions::default(),
        Some(value) => serde_json::from_value::<OptionsPayload>(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("invalid options: {}", e)))?
            .into_run_options(),
    };

    let requirements = match body.get("requirements") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<RequirementPayload>>(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("invalid requirements: {}", e)))?
            .into_iter()
            .map(|r| RequirementMapping {
                requirement_id: r.requirement_id,
                name: r.name,
                coverage: r.coverage.unwrap_or_default(),
            })
            .collect(),
    };

    let execution = Execution::new(task, framework);
    state.store.create_execution(&execution).await?;

    info!(
        execution = %execution.id,
        framework = %framework,
        "automation run started"
    );

    let execution_id = execution.id.clone();
    spawn_execution(state, execution, options, requirements);

    Ok(Json(json!({
        "executionId": execution_id,
        "status": "started",
        "framework": framework.as_str(),
    })))
}

/// Poll an execution's status.
///
/// GET /api/automation/status/{id}
pub async fn automation_status(
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

    Ok(Json(json!({
        "execution": execution,
        "steps": steps,
    })))
}

/// Stop an in-flight execution.
///
/// POST /api/automation/stop/{id}
///
/// Cancels the run cooperatively: the background task aborts at its next
/// await point, tears the browser down, and records the execution `stopped`.
/// Stopping an already-terminal execution is a no-op.
pub async fn stop_automation(
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

    if execution.status.is_terminal() {
        return Ok(Json(json!({
            "executionId": id,
            "status": "already_finished",
        })));
    }

    if state.cancel_running(&id) {
        info!(execution = %id, "stop requested");
        return Ok(Json(json!({
            "executionId": id,
            "status": "stopping",
        })));
    }

    // Row says running but nothing is in flight (e.g. process restart while
    // the run was active). Record it stopped directly.
    state
        .store
        .finish_execution(&id, testflow_core::ExecutionStatus::Stopped, 0, None)
        .await?;
    Ok(Json(json!({
        "executionId": id,
        "status": "stopped",
    })))
}

/// Supported frameworks.
///
/// GET /api/automation/frameworks
pub async fn list_frameworks(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.increment_requests();
    let frameworks: Vec<&str> = Framework::ALL.iter().map(|f| f.as_str()).collect();
    Json(json!({
        "frameworks": frameworks,
        "default": Framework::Playwright.as_str(),
    }))
}

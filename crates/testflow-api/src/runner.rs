//! Background execution driver.
//!
//! Runs one automation session per execution after the HTTP response is
//! sent: wires progress into the update hub, races the task against its
//! cancellation token, persists the outcome, and broadcasts a terminal event.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use testflow_automation::{
    ArtifactFile, AutomationSession, ProgressStage, ProgressUpdate, SessionOptions, TaskOutcome,
};
use testflow_core::{
    Artifact, Execution, ExecutionStatus, RequirementMapping, RunOptions, Step,
};
use testflow_store::StoreError;

use crate::state::AppState;
use crate::websocket::WsMessage;

/// Spawn the background run for a freshly created execution.
pub fn spawn_execution(
    state: Arc<AppState>,
    execution: Execution,
    options: RunOptions,
    requirements: Vec<RequirementMapping>,
) {
    let token = state.register_running(&execution.id);
    tokio::spawn(async move {
        let id = execution.id.clone();
        run_execution(state.clone(), execution, options, requirements, token).await;
        state.unregister_running(&id);
        state.hub.clear_execution(&id);
    });
}

async fn run_execution(
    state: Arc<AppState>,
    execution: Execution,
    options: RunOptions,
    requirements: Vec<RequirementMapping>,
    token: tokio_util::sync::CancellationToken,
) {
    let id = execution.id.clone();
    let started = Utc::now();

    let session_options = SessionOptions {
        execution_id: id.clone(),
        framework: execution.framework,
        run: options,
        artifacts_dir: state.config.artifacts.dir_path().join(&id),
        browser_binary: state.config.browser.binary.clone(),
        agent_endpoint: state.config.agent.endpoint.clone(),
        agent_api_key: state.config.agent.api_key.clone(),
        agent_max_actions: state.config.agent.max_actions,
        agent_timeout_seconds: state.config.agent.timeout_seconds,
    };

    let mut session = match AutomationSession::new(session_options) {
        Ok(session) => session,
        Err(e) => {
            finish(&state, &id, ExecutionStatus::Error, started, Some(e.to_string())).await;
            return;
        }
    };

    // Progress milestones go straight to WebSocket subscribers
    {
        let hub_state = state.clone();
        let hub_id = id.clone();
        session.set_progress_callback(Arc::new(move |update: ProgressUpdate| {
            let status = match update.stage {
                ProgressStage::Started => "started",
                ProgressStage::Finished => return, // terminal event is sent after persistence
                _ => "progress",
            };
            hub_state.hub.broadcast(
                &hub_id,
                WsMessage::automation_update(&hub_id, status, Some(update.message)),
            );
        }));
    }

    if let Err(e) = session.initialize().await {
        error!(execution = %id, "session initialization failed: {}", e);
        session.cleanup().await;
        finish(&state, &id, ExecutionStatus::Error, started, Some(e.to_string())).await;
        return;
    }

    let outcome = tokio::select! {
        outcome = session.run_task(&execution.task) => Some(outcome),
        _ = token.cancelled() => {
            info!(execution = %id, "execution cancelled by stop request");
            None
        }
    };

    session.cleanup().await;

    match outcome {
        Some(outcome) => persist_outcome(&state, &id, started, outcome, requirements).await,
        None => finish(&state, &id, ExecutionStatus::Stopped, started, None).await,
    }
}

/// Persist steps, artifacts, and requirements, then finish the execution.
async fn persist_outcome(
    state: &Arc<AppState>,
    id: &str,
    started: chrono::DateTime<Utc>,
    outcome: TaskOutcome,
    requirements: Vec<RequirementMapping>,
) {
    let status = outcome
        .steps
        .first()
        .map(|s| s.status)
        .unwrap_or(if outcome.success {
            ExecutionStatus::Passed
        } else {
            ExecutionStatus::Error
        });

    let screenshot_path = last_screenshot_path(&outcome.artifacts);

    let steps: Vec<Step> = outcome
        .steps
        .iter()
        .map(|s| Step {
            execution_id: id.to_string(),
            step_number: s.number,
            instruction: s.description.clone(),
            success: s.status == ExecutionStatus::Passed,
            duration_ms: s.duration_ms.unwrap_or(0),
            screenshot_path: screenshot_path.clone(),
            error: s.error.clone(),
        })
        .collect();

    if let Err(e) = state.store.insert_steps(steps).await {
        warn!(execution = %id, "failed to persist steps: {}", e);
    }

    for file in &outcome.artifacts {
        let artifact = Artifact::new(id, file.kind, file.path.to_string_lossy(), None);
        if let Err(e) = state.store.insert_artifact(&artifact).await {
            warn!(execution = %id, "failed to persist artifact: {}", e);
        }
    }

    if let Err(e) = state.store.insert_requirements(id, requirements).await {
        warn!(execution = %id, "failed to persist requirements: {}", e);
    }

    finish(state, id, status, started, outcome.error).await;
}

/// Screenshots are captured in order; the newest one documents the step's
/// outcome (final or error state), so that is the one linked to the step.
fn last_screenshot_path(artifacts: &[ArtifactFile]) -> Option<String> {
    artifacts
        .iter()
        .rev()
        .find(|a| a.kind == testflow_core::ArtifactKind::Screenshot)
        .map(|a| a.path.to_string_lossy().into_owned())
}

/// Record the terminal status and broadcast the terminal event.
async fn finish(
    state: &Arc<AppState>,
    id: &str,
    status: ExecutionStatus,
    started: chrono::DateTime<Utc>,
    error: Option<String>,
) {
    let duration_ms = (Utc::now() - started).num_milliseconds();

    match state
        .store
        .finish_execution(id, status, duration_ms, error.clone())
        .await
    {
        Ok(()) => {}
        // A stop request can win the race to the terminal state
        Err(StoreError::InvalidTransition { .. }) => {
            warn!(execution = %id, "execution already terminal, keeping stored status");
            return;
        }
        Err(e) => {
            error!(execution = %id, "failed to record terminal status: {}", e);
        }
    }

    let ws_status = match status {
        ExecutionStatus::Passed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Error => "error",
        ExecutionStatus::Stopped => "stopped",
        ExecutionStatus::Running => "progress",
    };
    state
        .hub
        .broadcast(id, WsMessage::automation_update(id, ws_status, error));
    info!(execution = %id, status = %status, duration_ms, "execution finished");
}

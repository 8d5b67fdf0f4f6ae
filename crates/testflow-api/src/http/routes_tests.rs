use super::*;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use testflow_core::{Artifact, ArtifactKind, Config, Execution, ExecutionStatus, Framework, Step};
use testflow_store::ExecutionStore;

async fn test_state() -> Arc<AppState> {
    let store = ExecutionStore::in_memory().await.unwrap();
    let mut config = Config::default();
    config.artifacts.dir = std::env::temp_dir()
        .join(format!("testflow-api-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    Arc::new(AppState::new(store, config))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_run_rejects_empty_task_without_creating_row() {
    let state = test_state().await;
    let app = create_router(state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/automation/run",
            json!({"task": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");
    assert!(state.store.list_executions(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_rejects_non_string_task() {
    let state = test_state().await;
    let app = create_router(state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/automation/run",
            json!({"task": 42}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.store.list_executions(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_rejects_unknown_framework() {
    let state = test_state().await;
    let app = create_router(state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/automation/run",
            json!({"task": "click something", "framework": "selenium"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("selenium"));
    assert!(state.store.list_executions(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_returns_execution_id_and_creates_running_row() {
    let state = test_state().await;
    let app = create_router(state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/automation/run",
            json!({"task": "navigate to github", "framework": "puppeteer"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "started");
    let execution_id = body["executionId"].as_str().unwrap();

    let execution = state
        .store
        .get_execution(execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.framework, Framework::Puppeteer);
    assert_eq!(execution.task, "navigate to github");
}

#[tokio::test]
async fn test_status_unknown_execution_is_404() {
    let app = create_router(test_state().await);
    let response = app
        .oneshot(get_request("/api/automation/status/nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_frameworks_endpoint() {
    let app = create_router(test_state().await);
    let response = app
        .oneshot(get_request("/api/automation/frameworks"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let frameworks = body["frameworks"].as_array().unwrap();
    assert!(frameworks.iter().any(|f| f == "playwright"));
    assert!(frameworks.iter().any(|f| f == "puppeteer"));
    assert_eq!(body["default"], "playwright");
}

#[tokio::test]
async fn test_stop_unknown_execution_is_404() {
    let app = create_router(test_state().await);
    let response = app
        .oneshot(json_request("POST", "/api/automation/stop/nope", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stop_terminal_execution_reports_already_finished() {
    let state = test_state().await;
    let execution = Execution::new("done already", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();
    state
        .store
        .finish_execution(&execution.id, ExecutionStatus::Passed, 100, None)
        .await
        .unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/automation/stop/{}", execution.id),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "already_finished");
}

#[tokio::test]
async fn test_stop_orphaned_running_row_records_stopped() {
    let state = test_state().await;
    let execution = Execution::new("orphan", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();

    let app = create_router(state.clone());
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/automation/stop/{}", execution.id),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "stopped");

    let stored = state
        .store
        .get_execution(&execution.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ExecutionStatus::Stopped);
}

#[tokio::test]
async fn test_list_results_empty() {
    let app = create_router(test_state().await);
    let response = app.oneshot(get_request("/api/test-results")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_delete_unknown_result_is_404() {
    let app = create_router(test_state().await);
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/test-results/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_result_cascades() {
    let state = test_state().await;
    let execution = Execution::new("to delete", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();
    state
        .store
        .insert_steps(vec![Step {
            execution_id: execution.id.clone(),
            step_number: 1,
            instruction: "to delete".to_string(),
            success: true,
            duration_ms: 10,
            screenshot_path: None,
            error: None,
        }])
        .await
        .unwrap();
    let artifact = Artifact::new(&execution.id, ArtifactKind::Screenshot, "/tmp/x.png", None);
    state.store.insert_artifact(&artifact).await.unwrap();

    let app = create_router(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/test-results/{}", execution.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state
        .store
        .get_execution(&execution.id)
        .await
        .unwrap()
        .is_none());
    assert!(state.store.steps_for(&execution.id).await.unwrap().is_empty());
    assert!(state
        .store
        .artifacts_for(&execution.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let state = test_state().await;
    let execution = Execution::new("stat me", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(get_request("/api/test-results/stats"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["stats"]["total"], 1);
    assert_eq!(body["stats"]["running"], 1);
}

#[tokio::test]
async fn test_artifact_for_unknown_execution_is_404_with_payload() {
    let app = create_router(test_state().await);
    let response = app
        .oneshot(get_request("/api/artifacts/nope/report"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_unknown_artifact_kind_is_404_with_payload() {
    let state = test_state().await;
    let execution = Execution::new("kinds", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(get_request(&format!(
            "/api/artifacts/{}/blueprint",
            execution.id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("blueprint"));
}

#[tokio::test]
async fn test_artifact_with_missing_file_is_404() {
    let state = test_state().await;
    let execution = Execution::new("gone", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();
    let artifact = Artifact::new(
        &execution.id,
        ArtifactKind::HtmlReport,
        "/definitely/not/here.html",
        None,
    );
    state.store.insert_artifact(&artifact).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(get_request(&format!(
            "/api/artifacts/{}/report",
            execution.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_served_inline_with_html_mime() {
    let state = test_state().await;
    let execution = Execution::new("report me", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.html");
    std::fs::write(&path, "<html><body>ok</body></html>").unwrap();
    let artifact = Artifact::new(
        &execution.id,
        ArtifactKind::HtmlReport,
        path.to_string_lossy(),
        None,
    );
    state.store.insert_artifact(&artifact).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(get_request(&format!(
            "/api/artifacts/{}/report",
            execution.id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(response.headers().get("content-disposition").is_none());
}

#[tokio::test]
async fn test_screenshot_download_sets_attachment_disposition() {
    let state = test_state().await;
    let execution = Execution::new("shot", Framework::Playwright);
    state.store.create_execution(&execution).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("final.png");
    std::fs::write(&path, b"\x89PNG\r\n").unwrap();
    let artifact = Artifact::new(
        &execution.id,
        ArtifactKind::Screenshot,
        path.to_string_lossy(),
        None,
    );
    state.store.insert_artifact(&artifact).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(get_request(&format!(
            "/api/artifacts/{}/screenshot/download",
            execution.id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("final.png"));
}

async fn failing_handler() -> Result<axum::Json<Value>, crate::error::ApiError> {
    Err(crate::error::ApiError::Store("disk failure: boom".to_string()))
}

/// Router with the detail-reveal layer around a handler that always fails,
/// mirroring the wiring in `create_router`.
fn failing_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/boom", get(failing_handler))
        .layer(middleware::map_response_with_state(
            state,
            reveal_error_details,
        ))
}

#[tokio::test]
async fn test_internal_error_detail_revealed_outside_production() {
    let state = test_state().await;
    assert!(!state.config.server.production);

    let response = failing_app(state)
        .oneshot(get_request("/boom"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal_error");
    assert!(body["message"].as_str().unwrap().contains("disk failure: boom"));
}

#[tokio::test]
async fn test_internal_error_detail_hidden_in_production() {
    let state = test_state().await;
    let mut config = state.config.clone();
    config.server.production = true;
    let store = ExecutionStore::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(store, config));

    let response = failing_app(state)
        .oneshot(get_request("/boom"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "internal server error");
    assert!(!body["message"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_state().await);
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["reachable"], true);
}

//! Artifact retrieval handlers.
//!
//! Artifacts are served from disk at the paths recorded in the store. A row
//! whose file has gone missing yields the same explanatory 404 as a missing
//! row; deletion of an execution never removes files.

use std::path::Path as FsPath;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use testflow_core::{Artifact, ArtifactKind};

use crate::error::ApiError;
use crate::state::AppState;

/// Serve the newest HTML report inline.
///
/// GET /api/artifacts/{id}/report
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.increment_requests();
    let artifact = latest_of_kind(&state, &id, ArtifactKind::HtmlReport).await?;
    serve_artifact(&artifact, false).await
}

/// List an execution's screenshots.
///
/// GET /api/artifacts/{id}/screenshots
pub async fn list_screenshots(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.increment_requests();
    ensure_execution(&state, &id).await?;
    let screenshots = state
        .store
        .artifacts_by_kind(&id, ArtifactKind::Screenshot)
        .await?;
    Ok(Json(json!({
        "count": screenshots.len(),
        "screenshots": screenshots,
    })))
}

/// Serve one screenshot inline.
///
/// GET /api/artifacts/{id}/screenshots/{screenshot_id}
pub async fn get_screenshot(
    State(state): State<Arc<AppState>>,
    Path((id, screenshot_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.increment_requests();

    let artifact = state
        .store
        .get_artifact(&id, &screenshot_id)
        .await?
        .filter(|a| a.kind == ArtifactKind::Screenshot)
        .ok_or_else(|| ApiError::NotFound {
            resource: "screenshot",
            id: screenshot_id.clone(),
        })?;
    serve_artifact(&artifact, false).await
}

/// Serve the newest artifact of a kind inline.
///
/// GET /api/artifacts/{id}/{kind}
pub async fn get_by_kind(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.increment_requests();
    let kind = parse_kind(&kind)?;
    let artifact = latest_of_kind(&state, &id, kind).await?;
    serve_artifact(&artifact, false).await
}

/// Serve the newest artifact of a kind as an attachment.
///
/// GET /api/artifacts/{id}/{kind}/download
pub async fn download_by_kind(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.increment_requests();
    let kind = parse_kind(&kind)?;
    let artifact = latest_of_kind(&state, &id, kind).await?;
    serve_artifact(&artifact, true).await
}

/// An unrecognized kind segment gets the same explanatory 404 as a missing
/// artifact.
fn parse_kind(kind: &str) -> Result<ArtifactKind, ApiError> {
    ArtifactKind::from_str(kind).map_err(|_| ApiError::NotFound {
        resource: "artifact type",
        id: format!(
            "{} (supported: screenshot, html_report, video, log, performance)",
            kind
        ),
    })
}

async fn ensure_execution(state: &Arc<AppState>, id: &str) -> Result<(), ApiError> {
    state
        .store
        .get_execution(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound {
            resource: "execution",
            id: id.to_string(),
        })
}

/// Newest stored artifact of a kind, or a 404 naming the kind.
async fn latest_of_kind(
    state: &Arc<AppState>,
    execution_id: &str,
    kind: ArtifactKind,
) -> Result<Artifact, ApiError> {
    ensure_execution(state, execution_id).await?;
    state
        .store
        .artifacts_by_kind(execution_id, kind)
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound {
            resource: "artifact",
            id: format!("{} for execution {}", kind, execution_id),
        })
}

/// Read the artifact from disk and build the response.
async fn serve_artifact(artifact: &Artifact, attachment: bool) -> Result<Response, ApiError> {
    let bytes = match tokio::fs::read(&artifact.file_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "artifact {} file missing at {}: {}",
                artifact.id, artifact.file_path, e
            );
            return Err(ApiError::NotFound {
                resource: "artifact file",
                id: artifact.id.clone(),
            });
        }
    };

    let mut headers = vec![(header::CONTENT_TYPE, artifact.mime_type.clone())];
    if attachment {
        let file_name = FsPath::new(&artifact.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.id.clone());
        headers.push((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ));
    }

    let mut response = bytes.into_response();
    for (name, value) in headers {
        let value = value
            .parse()
            .map_err(|_| ApiError::Internal("invalid response header".to_string()))?;
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

//! API error types and HTTP mapping.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use testflow_store::StoreError;

use crate::state::AppState;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// A named resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Storage failure.
    #[error("storage error: {0}")]
    Store(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ExecutionNotFound(id) => ApiError::NotFound {
                resource: "execution",
                id,
            },
            other => ApiError::Store(other.to_string()),
        }
    }
}

/// Full error text of a 500 response, carried as a response extension so the
/// detail-revealing layer can swap it in outside production.
#[derive(Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            ApiError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found: {}", resource, id),
            ),
            // Storage/internal details go to the log; clients get the full
            // text only when the reveal layer runs in a non-production server
            ApiError::Store(msg) | ApiError::Internal(msg) => {
                error!("request failed: {}", msg);
                let body = Json(json!({
                    "error": "internal_error",
                    "message": "internal server error",
                }));
                let mut response =
                    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
                response
                    .extensions_mut()
                    .insert(ErrorDetail(self.to_string()));
                return response;
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));
        (status, body).into_response()
    }
}

/// Response layer: outside production, replace the generic 500 body with the
/// full error text stashed in [`ErrorDetail`].
pub async fn reveal_error_details(
    State(state): State<Arc<AppState>>,
    response: Response,
) -> Response {
    if state.config.server.production {
        return response;
    }
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let body = Json(json!({
        "error": "internal_error",
        "message": detail.0,
    }));
    (response.status(), body).into_response()
}

//! Path-traversal lab endpoints: a sandboxed read that reports its verdict
//! as `{status, message, content?}` and a write used to seed target files.

use axum::{
    Json,
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::{ApiError, AppState, auth::CurrentUser, guards::client_ip};
use crate::services::{AuditAction, SandboxError};

#[derive(Deserialize)]
pub struct TestQuery {
    pub file: Option<String>,
}

#[derive(Serialize)]
pub struct TraversalResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn verdict(status: StatusCode, message: impl Into<String>, content: Option<String>) -> Response {
    let body = TraversalResponse {
        status: status.as_u16(),
        message: message.into(),
        content,
    };
    (status, Json(body)).into_response()
}

fn rejection(err: &SandboxError) -> (StatusCode, String) {
    match err {
        SandboxError::InvalidPath(_) | SandboxError::Traversal => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        SandboxError::DisallowedExtension => (StatusCode::FORBIDDEN, err.to_string()),
        SandboxError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        SandboxError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        SandboxError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        ),
    }
}

const fn is_blocked_attempt(status: StatusCode) -> bool {
    matches!(status, StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /tests/path-traversal/test?file=<path>
pub async fn test_path(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    Query(params): Query<TestQuery>,
) -> Result<Response, ApiError> {
    let Some(file) = params.file else {
        return Err(ApiError::validation("Query parameter 'file' is required"));
    };

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    let sandbox = state.sandbox().clone();
    let requested = file.clone();
    let result = tokio::task::spawn_blocking(move || sandbox.read(&requested))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match result {
        Ok(content) => {
            state
                .audit()
                .record(AuditAction::TraversalTestAllowed, Some(user.id), ip, None)
                .await;
            Ok(verdict(
                StatusCode::OK,
                "File read successfully",
                Some(content),
            ))
        }
        Err(err) => {
            if let SandboxError::Io(io_err) = &err {
                tracing::error!("Sandbox read failed for {:?}: {}", file, io_err);
            }

            let (status, message) = rejection(&err);
            if is_blocked_attempt(status) {
                let context = json!({ "payload": state.audit().snippet(&file) });
                state
                    .audit()
                    .record(
                        AuditAction::TraversalAttemptBlocked,
                        Some(user.id),
                        ip,
                        Some(context),
                    )
                    .await;
            }

            Ok(verdict(status, message, None))
        }
    }
}

#[derive(Deserialize)]
pub struct SaveFileRequest {
    pub filename: Option<String>,
    pub content: Option<String>,
}

/// POST /tests/path-traversal/save-file
/// Filenames pass the same sanitization as reads; rejected names are
/// audited like blocked traversal probes.
pub async fn save_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(payload): Json<SaveFileRequest>,
) -> Result<Response, ApiError> {
    let (Some(filename), Some(content)) = (payload.filename, payload.content) else {
        return Err(ApiError::validation("filename and content are required"));
    };

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    let sandbox = state.sandbox().clone();
    let name = filename.clone();
    let result = tokio::task::spawn_blocking(move || sandbox.save(&name, &content))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match result {
        Ok(path) => Ok((
            StatusCode::CREATED,
            Json(json!({ "ok": true, "path": path.to_string_lossy() })),
        )
            .into_response()),
        Err(err) => {
            let (status, _) = rejection(&err);
            if is_blocked_attempt(status) {
                let context = json!({ "payload": state.audit().snippet(&filename) });
                state
                    .audit()
                    .record(
                        AuditAction::TraversalAttemptBlocked,
                        Some(user.id),
                        ip,
                        Some(context),
                    )
                    .await;
            }
            Err(ApiError::from(err))
        }
    }
}

use axum::{
    Json,
    extract::{Extension, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{ApiError, AppState, auth::CurrentUser, guards::client_ip};
use crate::services::AuditAction;
use crate::services::scan::sanitize_for_log;

#[derive(Deserialize)]
pub struct SanitizeRequest {
    #[serde(default)]
    pub payload: String,
}

#[derive(Serialize)]
pub struct SanitizeResponse {
    pub sanitized: String,
    pub modified: bool,
}

/// POST /tests/log-sanitization
/// Neutralizes a payload before it reaches the logs. A payload that needed
/// modification is itself evidence of an injection attempt and is audited.
pub async fn sanitize_log(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(request): Json<SanitizeRequest>,
) -> Result<Json<SanitizeResponse>, ApiError> {
    let sanitized = sanitize_for_log(&request.payload);
    let modified = sanitized != request.payload;

    if modified {
        let trust_proxy = state.config().read().await.security.trust_proxy_headers;
        let ip = client_ip(&headers, trust_proxy);

        let context = json!({
            "payload": state.audit().snippet(&request.payload),
            "sanitized": state.audit().snippet(&sanitized),
        });
        state
            .audit()
            .record(
                AuditAction::LogInjectionAttemptFailed,
                Some(user.id),
                ip,
                Some(context),
            )
            .await;
    }

    info!(payload = %sanitized, "Log sanitization test entry");

    Ok(Json(SanitizeResponse { sanitized, modified }))
}

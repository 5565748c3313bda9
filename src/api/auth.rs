use axum::{
    Json,
    extract::{Extension, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::{ApiError, AppState, guards::client_ip, validation};
use crate::services::{LoginOutcome, RegisterOutcome, TokenError};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: String,
}

/// Identity attached to the request by [`auth_middleware`], reloaded from
/// the database on every request so lock and role changes apply immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Bearer token from the `Authorization` header. Raw token values and
/// surrounding quotes are tolerated.
pub(super) fn extract_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .unwrap_or(header)
        .trim()
        .trim_matches('"');

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Authentication middleware: verifies the signed token, reloads the
/// subject from the database, and rejects locked accounts.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_token(request.headers()) else {
        return Err(ApiError::unauthorized("Token missing"));
    };

    let claims = state.tokens().verify(&token).map_err(|err| match err {
        TokenError::Expired => ApiError::unauthorized("Token expired"),
        _ => ApiError::unauthorized("Invalid token"),
    })?;

    let user = state
        .store()
        .get_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_locked {
        return Err(ApiError::forbidden(
            "Account locked. Contact an administrator.",
        ));
    }

    tracing::Span::current().record("user_id", user.id);

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    });

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Drives one attempt through the lockout state machine; every outcome is
/// already audited by the time the response is built.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    let outcome = state
        .auth()
        .login(payload.email.trim(), &payload.password, ip)
        .await?;

    let response = match outcome {
        LoginOutcome::Success { token } => {
            (StatusCode::OK, Json(json!({ "token": token }))).into_response()
        }
        LoginOutcome::UnknownUser => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response(),
        LoginOutcome::WrongPassword { remaining } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "message": format!("Wrong password. Remaining attempts: {remaining}")
            })),
        )
            .into_response(),
        LoginOutcome::LockedOut { window_minutes } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": format!(
                    "Account locked after too many failed attempts. Try again in {window_minutes} minutes."
                )
            })),
        )
            .into_response(),
        LoginOutcome::LockedBrute {
            retry_after_minutes,
        } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": format!("Account locked. Try again in {retry_after_minutes} minutes.")
            })),
        )
            .into_response(),
        LoginOutcome::LockedAdmin => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Account locked. Contact an administrator." })),
        )
            .into_response(),
    };

    Ok(response)
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let email = validation::validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    let outcome = state
        .auth()
        .register(email, payload.name.trim(), &payload.password, ip)
        .await?;

    match outcome {
        RegisterOutcome::Created => Ok((
            StatusCode::CREATED,
            Json(json!({ "message": "User registered successfully" })),
        )
            .into_response()),
        RegisterOutcome::EmailTaken => Err(ApiError::conflict("Email already registered")),
    }
}

/// GET /auth/me
pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

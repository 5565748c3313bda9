use axum::{
    Json,
    extract::{Extension, Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AppState, auth::CurrentUser, guards::client_ip, validation};
use crate::db::User;
use crate::services::AuditAction;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_locked: bool,
    pub failed_login: i32,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_locked: user.is_locked,
            failed_login: user.failed_login,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub is_locked: Option<bool>,
    pub role: Option<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Layered after [`super::auth::auth_middleware`]; rejects non-admin callers.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|user| user.role == "admin");

    if !is_admin {
        return Err(ApiError::forbidden(
            "Access denied. Administrator privileges required.",
        ));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state.store().list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

/// PATCH /users/{id}
/// Lock state and role changes. An admin lock zeroes the failure counter
/// and clears the lock timestamp so it never self-expires.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    if payload.is_locked.is_none() && payload.role.is_none() {
        return Err(ApiError::validation("Nothing to update"));
    }

    let user = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    if let Some(locked) = payload.is_locked
        && locked != user.is_locked
    {
        state
            .store()
            .set_user_lock_fields(id, locked, 0, None)
            .await?;

        let action = if locked {
            AuditAction::AccountLockedAdmin
        } else {
            AuditAction::AccountUnlockedAdmin
        };
        state.audit().record(action, Some(id), ip.clone(), None).await;
    }

    if let Some(role) = payload.role.as_deref() {
        validation::validate_role(role)?;
        if role != user.role {
            state
                .store()
                .update_user_role(id, role)
                .await?
                .ok_or_else(|| ApiError::not_found("User not found"))?;

            state
                .audit()
                .record(AuditAction::UserRoleChanged, Some(id), ip, None)
                .await;
        }
    }

    let updated = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserDto::from(updated)))
}

/// POST /users/{id}/block
/// Shorthand for an admin lock.
pub async fn block_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !user.is_locked {
        state
            .store()
            .set_user_lock_fields(id, true, 0, None)
            .await?;

        let trust_proxy = state.config().read().await.security.trust_proxy_headers;
        let ip = client_ip(&headers, trust_proxy);
        state
            .audit()
            .record(AuditAction::AccountLockedAdmin, Some(id), ip, None)
            .await;
    }

    let updated = state
        .store()
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserDto::from(updated)))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Extension(actor): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    if actor.id == id {
        return Err(ApiError::validation(
            "You cannot delete your own account",
        ));
    }

    let deleted = state.store().delete_user(id).await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    let trust_proxy = state.config().read().await.security.trust_proxy_headers;
    let ip = client_ip(&headers, trust_proxy);

    // The target row is gone; the entry is attributed to the acting admin.
    state
        .audit()
        .record(AuditAction::UserDeleted, Some(actor.id), ip, None)
        .await;

    Ok(Json(serde_json::json!({ "message": "User deleted" })))
}

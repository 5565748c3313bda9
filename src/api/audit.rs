use axum::{
    Json,
    extract::{Extension, Query, State},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AppState, auth::CurrentUser, validation};
use crate::db::AuditQuery;
use crate::entities::{audit_logs, users};

const SELF_VIEW_MAX_LIMIT: u64 = 50;
const ADMIN_VIEW_MAX_LIMIT: u64 = 100;
const TOP_N: u64 = 5;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyLogsQuery {
    pub errors_only: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub user_id: Option<i32>,
    pub action: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub id: i64,
    pub action: String,
    pub user_id: Option<i32>,
    pub ip: Option<String>,
    pub executed_command: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<LogUser>,
}

#[derive(Serialize)]
pub struct LogUser {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AuditLogDto {
    fn from_model(log: audit_logs::Model, user: Option<users::Model>) -> Self {
        Self {
            id: log.id,
            action: log.action,
            user_id: log.user_id,
            ip: log.ip,
            executed_command: log.executed_command,
            created_at: log.created_at,
            user: user.map(|u| LogUser {
                name: u.name,
                email: u.email,
                role: u.role,
            }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
    pub per_page: u64,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub logs: Vec<AuditLogDto>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCount {
    pub user_id: i32,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<StatsUser>,
}

#[derive(Serialize)]
pub struct StatsUser {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub top_actions: Vec<ActionCount>,
    pub top_users: Vec<UserCount>,
    pub errors_last24h: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /audit
/// The caller's own trail, newest first.
pub async fn my_logs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<MyLogsQuery>,
) -> Result<Json<Vec<AuditLogDto>>, ApiError> {
    let start = params
        .start_date
        .as_deref()
        .map(|v| validation::parse_date_param(v, false))
        .transpose()?;
    let end = params
        .end_date
        .as_deref()
        .map(|v| validation::parse_date_param(v, true))
        .transpose()?;
    let limit = validation::clamp_limit(params.limit, SELF_VIEW_MAX_LIMIT, SELF_VIEW_MAX_LIMIT);

    let logs = state
        .store()
        .audit_for_user(
            user.id,
            params.errors_only.unwrap_or(false),
            start,
            end,
            limit,
        )
        .await?;

    Ok(Json(
        logs.into_iter()
            .map(|log| AuditLogDto::from_model(log, None))
            .collect(),
    ))
}

/// GET /admin/audit/logs
pub async fn admin_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminLogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = validation::clamp_limit(params.limit, 50, ADMIN_VIEW_MAX_LIMIT);

    let query = AuditQuery {
        page,
        per_page,
        user_id: params.user_id,
        action_contains: params.action.clone(),
        start_date: params
            .start_date
            .as_deref()
            .map(|v| validation::parse_date_param(v, false))
            .transpose()?,
        end_date: params
            .end_date
            .as_deref()
            .map(|v| validation::parse_date_param(v, true))
            .transpose()?,
    };

    let (rows, total) = state.store().audit_admin_query(&query).await?;

    let logs = rows
        .into_iter()
        .map(|(log, user)| AuditLogDto::from_model(log, user))
        .collect();

    Ok(Json(LogsResponse {
        logs,
        pagination: Pagination {
            total,
            pages: total.div_ceil(per_page),
            current_page: page,
            per_page,
        },
    }))
}

/// GET /admin/audit/stats
pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let top_actions = state.store().audit_top_actions(TOP_N).await?;
    let top_users = state.store().audit_top_users(TOP_N).await?;

    let cutoff = (Utc::now() - Duration::hours(24)).to_rfc3339();
    let errors_last24h = state.store().audit_failures_since(&cutoff).await?;

    let ids: Vec<i32> = top_users.iter().map(|(id, _)| *id).collect();
    let users = state.store().get_users_by_ids(&ids).await?;

    let top_users = top_users
        .into_iter()
        .map(|(user_id, count)| UserCount {
            user_id,
            count,
            user: users.iter().find(|u| u.id == user_id).map(|u| StatsUser {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
            }),
        })
        .collect();

    Ok(Json(StatsResponse {
        top_actions: top_actions
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect(),
        top_users,
        errors_last24h,
    }))
}

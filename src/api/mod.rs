use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuditService, AuthService, PathSandbox, PayloadScanner, TokenService};
use crate::state::SharedState;

pub mod audit;
pub mod auth;
mod error;
pub mod guards;
mod observability;
pub mod sanitize;
pub mod system;
pub mod traversal;
pub mod users;
mod validation;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth
    }

    #[must_use]
    pub fn audit(&self) -> &Arc<AuditService> {
        &self.shared.audit
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.shared.tokens
    }

    #[must_use]
    pub fn sandbox(&self) -> &Arc<PathSandbox> {
        &self.shared.sandbox
    }

    #[must_use]
    pub fn scanner(&self) -> &PayloadScanner {
        &self.shared.scanner
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };

    let api_router = Router::new()
        .route("/", get(system::root))
        .route("/system/health/live", get(system::health_live))
        .route("/metrics", get(observability::get_metrics))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(create_protected_router(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guards::xss_logger,
        ))
        .with_state(state);

    let cors_layer = if cors_origins.is_empty() || cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    api_router
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/audit", get(audit::my_logs))
        .route("/system/status", get(system::get_status))
        .route("/tests/path-traversal/test", get(traversal::test_path))
        .route(
            "/tests/path-traversal/save-file",
            post(traversal::save_file).layer(middleware::from_fn_with_state(
                state.clone(),
                guards::payload_limit,
            )),
        )
        .route("/tests/log-sanitization", post(sanitize::sanitize_log))
        .merge(create_admin_router())
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", patch(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/block", post(users::block_user))
        .route("/admin/audit/logs", get(audit::admin_logs))
        .route("/admin/audit/stats", get(audit::admin_stats))
        .route_layer(middleware::from_fn(users::require_admin))
}

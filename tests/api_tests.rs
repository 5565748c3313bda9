//! Integration tests for the authentication flow: registration, login,
//! the brute-force lockout ladder, and token handling.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use vigil::config::Config;

/// Admin account seeded by migration (must match m20260410_create_users.rs)
const SEEDED_ADMIN_EMAIL: &str = "admin@example.com";
const SEEDED_ADMIN_PASSWORD: &str = "admin@123";

async fn spawn_app() -> (Arc<vigil::api::AppState>, Router) {
    let db_path = std::env::temp_dir().join(format!("vigil-api-test-{}.db", uuid::Uuid::new_v4()));
    let sandbox_root =
        std::env::temp_dir().join(format!("vigil-api-sandbox-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.sandbox.root_path = sandbox_root.to_string_lossy().to_string();

    let state = vigil::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let router = vigil::api::router(state.clone()).await;
    (state, router)
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, email: &str, name: &str, password: &str) {
    let response = post_json(
        app,
        "/auth/register",
        serde_json::json!({ "email": email, "name": name, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn login_token(app: &Router, email: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/auth/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    json["token"].as_str().expect("login should return a token").to_string()
}

#[tokio::test]
async fn test_register_login_me_roundtrip() {
    let (_, app) = spawn_app().await;

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({
            "email": "dana@example.com",
            "name": "Dana",
            "password": "hunter2!"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "User registered successfully");

    // Same email again
    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({
            "email": "dana@example.com",
            "name": "Dana Again",
            "password": "other-pass"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Email already registered");

    let token = login_token(&app, "dana@example.com", "hunter2!").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["email"], "dana@example.com");
    assert_eq!(json["name"], "Dana");
    assert_eq!(json["role"], "user");
}

#[tokio::test]
async fn test_register_validation() {
    let (_, app) = spawn_app().await;

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({ "name": "No Email", "password": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Email is required");

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({ "email": "not-an-email", "name": "X", "password": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Email address is not valid");

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({ "email": "ok@example.com", "name": "X" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Password is required");
}

#[tokio::test]
async fn test_login_unknown_user_is_generic() {
    let (_, app) = spawn_app().await;

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "ghost@example.com", "password": "whatever" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    // Must not reveal whether the account exists
    assert_eq!(json["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_lockout_after_five_wrong_passwords() {
    let (_, app) = spawn_app().await;
    register(&app, "eve@example.com", "Eve", "correct-horse").await;

    // Four wrong passwords count down the remaining attempts
    for remaining in (1..=4).rev() {
        let response = post_json(
            &app,
            "/auth/login",
            serde_json::json!({ "email": "eve@example.com", "password": "wrong" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(
            json["message"],
            format!("Wrong password. Remaining attempts: {remaining}")
        );
    }

    // The fifth locks the account
    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "eve@example.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Account locked after too many failed attempts. Try again in 15 minutes."
    );

    // The correct password inside the window is rejected too, and the
    // extended attempt doubles the window (strikes are now past the
    // threshold).
    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "eve@example.com", "password": "correct-horse" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Account locked. Try again in 30 minutes."
    );
}

#[tokio::test]
async fn test_successful_login_resets_the_counter() {
    let (state, app) = spawn_app().await;
    register(&app, "frank@example.com", "Frank", "pass-frank").await;

    for _ in 0..3 {
        let response = post_json(
            &app,
            "/auth/login",
            serde_json::json!({ "email": "frank@example.com", "password": "nope" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    login_token(&app, "frank@example.com", "pass-frank").await;

    let user = state
        .store()
        .get_user_by_email("frank@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_login, 0);
    assert!(!user.is_locked);

    // Counter starts over: one more wrong password reports 4 remaining
    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "frank@example.com", "password": "nope" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["message"], "Wrong password. Remaining attempts: 4");
}

#[tokio::test]
async fn test_admin_locked_account_rejects_even_correct_password() {
    let (state, app) = spawn_app().await;
    register(&app, "gina@example.com", "Gina", "pass-gina").await;

    let user = state
        .store()
        .get_user_by_email("gina@example.com")
        .await
        .unwrap()
        .unwrap();
    state
        .store()
        .set_user_lock_fields(user.id, true, 0, None)
        .await
        .unwrap();

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "gina@example.com", "password": "pass-gina" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Account locked. Contact an administrator.");
}

#[tokio::test]
async fn test_locked_account_invalidates_existing_tokens() {
    let (state, app) = spawn_app().await;
    register(&app, "hank@example.com", "Hank", "pass-hank").await;
    let token = login_token(&app, "hank@example.com", "pass-hank").await;

    let user = state
        .store()
        .get_user_by_email("hank@example.com")
        .await
        .unwrap()
        .unwrap();
    state
        .store()
        .set_user_lock_fields(user.id, true, 0, None)
        .await
        .unwrap();

    // The token is still cryptographically valid; the lock wins anyway
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Account locked. Contact an administrator.");
}

#[tokio::test]
async fn test_seeded_admin_can_login() {
    let (_, app) = spawn_app().await;

    let token = login_token(&app, SEEDED_ADMIN_EMAIL, SEEDED_ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["role"], "admin");
}

#[tokio::test]
async fn test_token_header_formats_are_tolerated() {
    let (_, app) = spawn_app().await;
    register(&app, "iris@example.com", "Iris", "pass-iris").await;
    let token = login_token(&app, "iris@example.com", "pass-iris").await;

    // Raw token without the Bearer prefix
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("Authorization", token.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Quoted token, as pasted from a JSON response
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("Authorization", format!("Bearer \"{token}\""))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_land_in_the_audit_trail() {
    let (state, app) = spawn_app().await;
    register(&app, "jude@example.com", "Jude", "pass-jude").await;

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "jude@example.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = state
        .store()
        .get_user_by_email("jude@example.com")
        .await
        .unwrap()
        .unwrap();
    let logs = state
        .store()
        .audit_for_user(user.id, true, None, None, 50)
        .await
        .unwrap();

    let failed = logs
        .iter()
        .find(|log| log.action == "LOGIN_FAILED_WRONG_PASSWORD")
        .expect("failed login should be audited");
    // Failure rows keep their JSON context
    let context = failed.executed_command.as_deref().unwrap();
    assert!(context.contains("remainingAttempts"));
}

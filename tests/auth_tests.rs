//! Integration tests for the authentication endpoints.
//!
//! Covers the login gauntlet (throttling, status gates), session lifecycle,
//! self-service registration and renewal requests.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use forensic_hr::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Super admin password seeded by migration (must match m20250101_initial.rs)
const ADMIN_PASSWORD: &str = "Admin@2025";

async fn spawn_app() -> Router {
    let db_path =
        std::env::temp_dir().join(format!("forensic-hr-auth-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}", db_path.display());

    let state = forensic_hr::api::create_app_state(config, None)
        .await
        .expect("Failed to create app state");
    forensic_hr::api::router(state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &Value,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let response = send_json(
        app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": username, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    body["data"]["token"]
        .as_str()
        .expect("login response must carry a token")
        .to_string()
}

async fn register_officer(app: &Router, username: &str) {
    let response = send_json(
        app,
        "POST",
        "/api/auth/register",
        None,
        &json!({
            "username": username,
            "password": "Secret#1",
            "fullName": "Test Officer",
            "rank": "Sergeant",
            "division": "Digital Forensics"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn find_user_id(app: &Router, admin_token: &str, username: &str) -> i64 {
    let response = get(
        app,
        &format!("/api/admin/users?search={username}"),
        Some(admin_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    body["data"][0]["id"].as_i64().expect("user id")
}

/// Registers and approves an account, returning its id.
async fn provision_officer(app: &Router, admin_token: &str, username: &str) -> i64 {
    register_officer(app, username).await;
    let id = find_user_id(app, admin_token, username).await;

    let response = send_json(
        app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(admin_token),
        &json!({ "action": "approve" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    id
}

#[tokio::test]
async fn test_login_success_sets_cookie() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "admin", "password": ADMIN_PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login must set the session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));

    let body = read_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    assert_eq!(body["data"]["user"]["username"], "admin");
    assert_eq!(body["data"]["user"]["role"], "super_admin");
    assert!(body["data"]["expiresAt"].is_string());
    assert!(body["data"]["expireWarning"].is_null());
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "ghost", "password": "whatever" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "admin", "password": "" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_logins_count_down_then_lock() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    let id = provision_officer(&app, &admin, "throttled").await;

    let bad = json!({ "username": "throttled", "password": "wrong" });

    let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Incorrect password (2 attempts remaining)");

    let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Incorrect password (1 attempts remaining)");

    // Third strike applies the time lock
    let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("account locked for 30 minutes")
    );

    // Even the correct password bounces while the lock holds
    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "throttled", "password": "Secret#1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("try again in 30 minutes")
    );

    // Admin unlock clears the counter and the deadline
    let response = send_json(
        &app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(&admin),
        &json!({ "action": "unlock" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    login_token(&app, "throttled", "Secret#1").await;
}

#[tokio::test]
async fn test_time_lock_expires_on_its_own() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    provision_officer(&app, &admin, "patient").await;

    // Collapse the lock window so the deadline has already passed by the
    // next request
    let response = send_json(
        &app,
        "PUT",
        "/api/admin/settings",
        Some(&admin),
        &json!({ "lock_duration_minutes": "0" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let bad = json!({ "username": "patient", "password": "wrong" });
    for _ in 0..2 {
        let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // No admin unlock: the elapsed deadline alone restores access
    login_token(&app, "patient", "Secret#1").await;

    // And the successful login reset the strike counter
    let response = send_json(&app, "POST", "/api/auth/login", None, &bad).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Incorrect password (2 attempts remaining)");
}

#[tokio::test]
async fn test_pending_account_cannot_login() {
    let app = spawn_app().await;
    register_officer(&app, "waiting").await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "waiting", "password": "Secret#1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["code"], "PENDING");
    assert_eq!(body["error"], "Account is awaiting administrator approval");
}

#[tokio::test]
async fn test_rejected_account_cannot_login() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    register_officer(&app, "declined").await;
    let id = find_user_id(&app, &admin, "declined").await;

    let response = send_json(
        &app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(&admin),
        &json!({ "action": "reject" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "declined", "password": "Secret#1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["code"], "REJECTED");
}

#[tokio::test]
async fn test_admin_locked_account_cannot_login() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    let id = provision_officer(&app, &admin, "benched").await;

    let response = send_json(
        &app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(&admin),
        &json!({ "action": "lock" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "benched", "password": "Secret#1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["code"], "LOCKED");
}

#[tokio::test]
async fn test_expired_account_cannot_login_and_status_is_persisted() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    let id = provision_officer(&app, &admin, "lapsed").await;

    let response = send_json(
        &app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(&admin),
        &json!({ "action": "save", "expireDate": "2020-01-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "lapsed", "password": "Secret#1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["code"], "EXPIRED");

    // The lapse is written back, so the admin table shows it
    let response = get(&app, "/api/admin/users?search=lapsed", Some(&admin)).await;
    let body = read_json(response).await;
    assert_eq!(body["data"][0]["status"], "expired");
}

#[tokio::test]
async fn test_login_warns_when_expiry_is_near() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    let id = provision_officer(&app, &admin, "shorttimer").await;

    let soon = (chrono::Utc::now().date_naive() + chrono::Duration::days(3))
        .format("%Y-%m-%d")
        .to_string();
    let response = send_json(
        &app,
        "PUT",
        &format!("/api/admin/users/{id}"),
        Some(&admin),
        &json!({ "action": "save", "expireDate": soon }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "shorttimer", "password": "Secret#1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(
        body["data"]["expireWarning"],
        "Your account expires in 3 days"
    );
}

#[tokio::test]
async fn test_second_login_kicks_first_session() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    provision_officer(&app, &admin, "nomad").await;

    let first = login_token(&app, "nomad", "Secret#1").await;
    let second = login_token(&app, "nomad", "Secret#1").await;

    let response = get(&app, "/api/auth/me", Some(&first)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "SESSION_KICKED");

    let response = get(&app, "/api/auth/me", Some(&second)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_the_session() {
    let app = spawn_app().await;
    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let response = send_json(&app, "POST", "/api/auth/logout", Some(&token), &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("logout must clear the cookie")
        .to_str()
        .unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let body = read_json(response).await;
    assert_eq!(body["message"], "Logged out");

    let response = get(&app, "/api/auth/me", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_profile_without_secrets() {
    let app = spawn_app().await;
    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let response = get(&app, "/api/auth/me", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["fullName"], "System Administrator");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let app = spawn_app().await;

    let response = get(&app, "/api/auth/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn test_cookie_carries_the_session_too() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        &json!({ "username": "admin", "password": ADMIN_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let pair = set_cookie.split(';').next().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_validates_input() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/register",
        None,
        &json!({ "username": "", "password": "Secret#1", "fullName": "Nobody" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send_json(
        &app,
        "POST",
        "/api/auth/register",
        None,
        &json!({ "username": "shortpw", "password": "abc", "fullName": "Short Password" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Password must be at least 6 characters");
}

#[tokio::test]
async fn test_register_rejects_duplicate_username() {
    let app = spawn_app().await;
    register_officer(&app, "twice").await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/register",
        None,
        &json!({ "username": "twice", "password": "Secret#1", "fullName": "Second Copy" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Username is already taken");
}

#[tokio::test]
async fn test_register_lands_in_pending() {
    let app = spawn_app().await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/register",
        None,
        &json!({ "username": "recruit", "password": "Secret#1", "fullName": "New Recruit" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    assert_eq!(body["data"]["username"], "recruit");
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn test_renewal_request_once_per_user() {
    let app = spawn_app().await;
    let admin = login_token(&app, "admin", ADMIN_PASSWORD).await;
    provision_officer(&app, &admin, "renewer").await;
    let token = login_token(&app, "renewer", "Secret#1").await;

    let response = send_json(
        &app,
        "POST",
        "/api/auth/renew-request",
        Some(&token),
        &json!({ "reason": "Contract extension" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Renewal request submitted");
    assert_eq!(body["data"]["status"], "pending");

    let response = send_json(
        &app,
        "POST",
        "/api/auth/renew-request",
        Some(&token),
        &json!({ "reason": "Asking again" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "A pending renewal request already exists");
}

#[tokio::test]
async fn test_public_settings_expose_only_branding() {
    let app = spawn_app().await;

    let response = get(&app, "/api/auth/settings", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["data"]["system_name"], "Forensic HR");
    assert_eq!(
        body["data"]["organization_name"],
        "Office of Police Forensic Science"
    );
    // Throttle policy stays private
    assert!(body["data"].get("max_login_attempts").is_none());
}

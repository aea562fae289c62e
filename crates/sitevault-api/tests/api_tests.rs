//! API Integration Tests
//!
//! Drive the full router with in-memory stores. Media tests run a small axum
//! server on an ephemeral port standing in for the object store.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use sitevault_api::auth::jwt::issue_token_at;
use sitevault_api::auth::{is_hashed, validate_token, JwtConfig};
use sitevault_api::create_router;
use sitevault_api::media::MediaObject;
use sitevault_api::testing::{
    create_router_for_testing, hashed_user, test_config, test_state, InMemoryMediaRepository,
    InMemoryUserRepository, StaticObjectStorage,
};
use sitevault_core::{AppConfig, ByteRange, UserRole, UserStatus};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "Formwork-2024";
const MIB: usize = 1024 * 1024;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

struct TestApp {
    router: Router,
    users: Arc<InMemoryUserRepository>,
    media: Arc<InMemoryMediaRepository>,
    config: AppConfig,
}

impl TestApp {
    fn new() -> Self {
        Self::with_storage(StaticObjectStorage::new("http://storage.invalid"))
    }

    fn with_storage(storage: StaticObjectStorage) -> Self {
        let config = test_config();
        let users = Arc::new(InMemoryUserRepository::new());
        let media = Arc::new(InMemoryMediaRepository::new());
        let state = test_state(config.clone(), users.clone(), media.clone(), storage);
        Self {
            router: create_router(state),
            users,
            media,
            config,
        }
    }

    fn add_user(&self, email: &str, role: UserRole) -> Uuid {
        let user = hashed_user(email, PASSWORD, role);
        let id = user.id;
        self.users.insert(user);
        id
    }

    fn jwt_config(&self) -> JwtConfig {
        JwtConfig::from(&self.config.auth)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, json) = self
            .send_json(create_json_request(
                "POST",
                "/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {json}");
        json["token"].as_str().unwrap().to_string()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = TestApp::new();
    let (status, json) = app
        .send_json(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["database"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    let (status, _, body) = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("sitevault_uptime_seconds"));
}

#[tokio::test]
async fn test_metrics_label_route_templates_not_raw_paths() {
    let app = TestApp::new();
    let stray = format!("/no/such/route-{}", Uuid::new_v4());
    let (status, _, _) = app
        .send(Request::builder().uri(&stray).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    let (_, _, body) = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("endpoint=\"unmatched\""));
    assert!(text.contains("endpoint=\"/health\""));
    assert!(!text.contains(&stray));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new();
    let (status, json) = app
        .send_json(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/auth/login"].is_object());
    assert!(json["paths"]["/media"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_returns_token_with_identity_claims() {
    let app = TestApp::new();
    let id = app.add_user("engineer@site.example.com", UserRole::SiteEngineer);

    let (status, headers, body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "engineer@site.example.com", "password": PASSWORD})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["user"]["id"], id.to_string());
    assert_eq!(json["user"]["role"], "site_engineer");
    assert!(json["user"].get("password").is_none());

    let claims = validate_token(&app.jwt_config(), json["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, id.to_string());
    assert_eq!(claims.email, "engineer@site.example.com");
    assert_eq!(claims.role, "site_engineer");
    assert_eq!(claims.exp - claims.iat, app.config.auth.token_ttl_secs);
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_are_indistinguishable() {
    let app = TestApp::new();
    app.add_user("pm@site.example.com", UserRole::ProjectManager);

    let (unknown_status, _, unknown_body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "nobody@site.example.com", "password": PASSWORD})),
        ))
        .await;
    let (wrong_status, _, wrong_body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "pm@site.example.com", "password": "not-the-password"})),
        ))
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, wrong_body);

    let json: Value = serde_json::from_slice(&wrong_body).unwrap();
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_unknown_email_costs_as_much_as_wrong_password() {
    let app = TestApp::new();
    let hash = sitevault_api::auth::hash_password(PASSWORD).unwrap();
    app.users.insert(sitevault_api::auth::User::new(
        "pm@site.example.com",
        hash,
        UserRole::ProjectManager,
    ));

    let attempt = |email: &'static str| {
        create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": email, "password": "not-the-password"})),
        )
    };

    // First unknown-email login also builds the comparison hash
    app.send(attempt("warmup@site.example.com")).await;

    let started = Instant::now();
    let (status, _, _) = app.send(attempt("nobody@site.example.com")).await;
    let unknown = started.elapsed();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let started = Instant::now();
    let (status, _, _) = app.send(attempt("pm@site.example.com")).await;
    let wrong = started.elapsed();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(
        wrong < unknown * 10 && unknown < wrong * 10,
        "unknown email took {unknown:?}, wrong password took {wrong:?}"
    );
}

#[tokio::test]
async fn test_inactive_account_cannot_login() {
    let app = TestApp::new();
    let id = app.add_user("former@site.example.com", UserRole::Contractor);
    app.users.modify(id, |u| u.status = UserStatus::Inactive);

    let (status, json) = app
        .send_json(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "former@site.example.com", "password": PASSWORD})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ACCOUNT_INACTIVE");
}

#[tokio::test]
async fn test_login_with_legacy_plaintext_credential() {
    let app = TestApp::new();
    app.users.insert(sitevault_api::auth::User::new(
        "legacy@site.example.com",
        "old-plain-secret",
        UserRole::User,
    ));

    app.login("legacy@site.example.com", "old-plain-secret").await;

    let (status, _) = app
        .send_json(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "legacy@site.example.com", "password": "old-plain-secreT"})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_validation() {
    let app = TestApp::new();

    let cases = [
        json!({"email": "", "password": "x"}),
        json!({"email": "a@b.co", "password": ""}),
        json!({"email": "not-an-email", "password": "whatever"}),
        json!({"email": "a @b.co", "password": "whatever"}),
        json!({"email": "a@b.co"}),
    ];
    for body in cases {
        let (status, json) = app
            .send_json(create_json_request("POST", "/auth/login", None, Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}

// =============================================================================
// Token Verification Tests
// =============================================================================

#[tokio::test]
async fn test_verify_returns_live_user() {
    let app = TestApp::new();
    let id = app.add_user("qs@site.example.com", UserRole::User);
    let token = app.login("qs@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"], id.to_string());
    assert!(json["user"].get("password").is_none());
}

#[tokio::test]
async fn test_verify_without_token() {
    let app = TestApp::new();
    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", None, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn test_verify_after_role_change() {
    let app = TestApp::new();
    let id = app.add_user("promoted@site.example.com", UserRole::SiteEngineer);
    let token = app.login("promoted@site.example.com", PASSWORD).await;

    app.users.modify(id, |u| u.role = UserRole::ProjectManager);

    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ROLE_CHANGED");
}

#[tokio::test]
async fn test_verify_after_deactivation() {
    let app = TestApp::new();
    let id = app.add_user("leaver@site.example.com", UserRole::User);
    let token = app.login("leaver@site.example.com", PASSWORD).await;

    app.users.modify(id, |u| u.status = UserStatus::Inactive);

    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ACCOUNT_INACTIVE");
}

#[tokio::test]
async fn test_expired_token_is_invalid() {
    let app = TestApp::new();
    let id = app.add_user("night@site.example.com", UserRole::User);
    let user = app.users.get(id).unwrap();

    let (token, _) = issue_token_at(&app.jwt_config(), &user, now_secs() - 7200, 3600).unwrap();

    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_token_for_missing_user_is_invalid() {
    let app = TestApp::new();
    let ghost = hashed_user("ghost@site.example.com", PASSWORD, UserRole::User);
    let (token, _) = issue_token_at(&app.jwt_config(), &ghost, now_secs(), 600).unwrap();

    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_garbage_bearer_token() {
    let app = TestApp::new();
    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some("not.a.jwt"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

// =============================================================================
// Password Change Tests
// =============================================================================

#[tokio::test]
async fn test_change_own_password() {
    let app = TestApp::new();
    let id = app.add_user("me@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"currentPassword": PASSWORD, "newPassword": "Rebar-Schedule-9"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert!(json["message"].is_string());

    assert!(is_hashed(&app.users.get(id).unwrap().password));
    app.login("me@site.example.com", "Rebar-Schedule-9").await;

    let (status, _) = app
        .send_json(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "me@site.example.com", "password": PASSWORD})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_upgrades_legacy_credential() {
    let app = TestApp::new();
    let user = sitevault_api::auth::User::new("old@site.example.com", "plain-old-pass", UserRole::User);
    let id = user.id;
    app.users.insert(user);
    let token = app.login("old@site.example.com", "plain-old-pass").await;

    let (status, _) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"userId": id, "currentPassword": "plain-old-pass", "newPassword": "brand-new-pass"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(is_hashed(&app.users.get(id).unwrap().password));
}

#[tokio::test]
async fn test_change_password_with_wrong_current_password() {
    let app = TestApp::new();
    app.add_user("me@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"currentPassword": "guess", "newPassword": "Rebar-Schedule-9"})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_change_password_rejects_weak_password() {
    let app = TestApp::new();
    app.add_user("me@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"currentPassword": PASSWORD, "newPassword": "short"})),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_change_password_of_another_user_requires_admin() {
    let app = TestApp::new();
    app.add_user("me@site.example.com", UserRole::ProjectManager);
    let victim = app.add_user("victim@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"userId": victim, "currentPassword": PASSWORD, "newPassword": "Taken-Over-1"})),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
    app.login("victim@site.example.com", PASSWORD).await;
}

#[tokio::test]
async fn test_admin_can_change_another_users_password() {
    let app = TestApp::new();
    app.add_user("admin@site.example.com", UserRole::Admin);
    let target = app.add_user("crew@site.example.com", UserRole::Contractor);
    let token = app.login("admin@site.example.com", PASSWORD).await;

    let (status, _) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"userId": target, "currentPassword": PASSWORD, "newPassword": "Reset-By-Admin-1"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.login("crew@site.example.com", "Reset-By-Admin-1").await;
}

#[tokio::test]
async fn test_change_password_for_unknown_target() {
    let app = TestApp::new();
    app.add_user("admin@site.example.com", UserRole::Admin);
    let token = app.login("admin@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/password",
            Some(&token),
            Some(json!({"userId": Uuid::new_v4(), "currentPassword": PASSWORD, "newPassword": "Whatever-123"})),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// =============================================================================
// Profile Update Tests
// =============================================================================

#[tokio::test]
async fn test_profile_update_never_touches_id_or_credential() {
    let app = TestApp::new();
    let id = app.add_user("me@site.example.com", UserRole::User);
    let before = app.users.get(id).unwrap();
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/profile",
            Some(&token),
            Some(json!({
                "id": Uuid::new_v4(),
                "password": "hijacked",
                "password_hash": "$2b$04$forged",
                "company": "Northside Civils",
                "job_title": "Site Manager"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["company"], "Northside Civils");
    assert!(json.get("password").is_none());

    let after = app.users.get(id).unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.password, before.password);
    assert_eq!(after.job_title.as_deref(), Some("Site Manager"));
    app.login("me@site.example.com", PASSWORD).await;
}

#[tokio::test]
async fn test_profile_update_with_only_protected_fields_returns_current_record() {
    let app = TestApp::new();
    let id = app.add_user("me@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/profile",
            Some(&token),
            Some(json!({"password": "x"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["email"], "me@site.example.com");
}

#[tokio::test]
async fn test_profile_update_rejects_unknown_and_privileged_fields() {
    let app = TestApp::new();
    app.add_user("me@site.example.com", UserRole::User);
    let token = app.login("me@site.example.com", PASSWORD).await;

    for body in [json!({"created_at": "2001-01-01"}), json!({"role": "admin"}), json!({"phone": 123})] {
        let (status, json) = app
            .send_json(create_json_request("PUT", "/users/profile", Some(&token), Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_admin_can_change_own_role_fields() {
    let app = TestApp::new();
    let id = app.add_user("admin@site.example.com", UserRole::Admin);
    let token = app.login("admin@site.example.com", PASSWORD).await;

    let (status, json) = app
        .send_json(create_json_request(
            "PUT",
            "/users/profile",
            Some(&token),
            Some(json!({"role": "project_manager"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["role"], "project_manager");
    assert_eq!(app.users.get(id).unwrap().role, UserRole::ProjectManager);

    // The old token embedded the admin role
    let (status, json) = app
        .send_json(create_json_request("POST", "/auth/verify", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ROLE_CHANGED");
}

// =============================================================================
// Media Proxy Tests
// =============================================================================

/// Object store stand-in: serves `data` for any path, honouring `Range`
async fn serve_object(State(data): State<Arc<Vec<u8>>>, headers: HeaderMap) -> Response {
    let total = data.len() as u64;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse);

    match range {
        Some(range) if total > 0 && range.start < total => {
            let end = range.end.unwrap_or(total - 1).min(total - 1);
            let slice = data[range.start as usize..=end as usize].to_vec();
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_RANGE, format!("bytes {}-{end}/{total}", range.start)),
                    (header::CONTENT_LENGTH, slice.len().to_string()),
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                ],
                slice,
            )
                .into_response()
        }
        _ => (
            StatusCode::OK,
            [(header::CONTENT_LENGTH, total.to_string())],
            data.to_vec(),
        )
            .into_response(),
    }
}

/// Serves the whole object with 200 whatever `Range` asks for
async fn serve_whole_object(State(data): State<Arc<Vec<u8>>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_LENGTH, data.len().to_string())],
        data.to_vec(),
    )
        .into_response()
}

/// Answers ranged reads with at most 10 bytes, starting where asked
async fn serve_short_ranges(State(data): State<Arc<Vec<u8>>>, headers: HeaderMap) -> Response {
    let total = data.len() as u64;
    let Some(range) = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse)
    else {
        return serve_whole_object(State(data)).await;
    };
    let start = range.start;
    let end = (start + 9).min(total - 1);
    let slice = data[start as usize..=end as usize].to_vec();
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
            (header::CONTENT_LENGTH, slice.len().to_string()),
        ],
        slice,
    )
        .into_response()
}

async fn spawn_object_store(data: Vec<u8>) -> String {
    spawn_store(
        Router::new()
            .route("/*path", get(serve_object))
            .with_state(Arc::new(data)),
    )
    .await
}

async fn spawn_store(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn object_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn media_app(data: Vec<u8>) -> (TestApp, Uuid) {
    let base = spawn_object_store(data).await;
    let app = TestApp::with_storage(StaticObjectStorage::new(base));
    let id = app.media.add("projects/7/pour.mp4", Some("video/mp4"));
    (app, id)
}

async fn media_app_with_store(store: Router) -> (TestApp, Uuid) {
    let base = spawn_store(store).await;
    let app = TestApp::with_storage(StaticObjectStorage::new(base));
    let id = app.media.add("projects/7/pour.mp4", Some("video/mp4"));
    (app, id)
}

fn media_request(id: &str, range: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(format!("/media?id={id}"));
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_media_without_range_serves_first_chunk() {
    let total = MIB + MIB / 2;
    let data = object_bytes(total);
    let (app, id) = media_app(data.clone()).await;

    let (status, headers, body) = app.send(media_request(&id.to_string(), None)).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        headers[header::CONTENT_RANGE],
        format!("bytes 0-{}/{total}", MIB - 1).as_str()
    );
    assert_eq!(headers[header::CONTENT_LENGTH], MIB.to_string().as_str());
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body.len(), MIB);
    assert_eq!(&body[..], &data[..MIB]);
}

#[tokio::test]
async fn test_media_small_object_without_range() {
    let data = object_bytes(500);
    let (app, id) = media_app(data.clone()).await;

    let (status, headers, body) = app.send(media_request(&id.to_string(), None)).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-499/500");
    assert_eq!(&body[..], &data[..]);
}

#[tokio::test]
async fn test_media_explicit_range() {
    let data = object_bytes(5000);
    let (app, id) = media_app(data.clone()).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=100-199")))
        .await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/5000");
    assert_eq!(headers[header::CONTENT_LENGTH], "100");
    assert_eq!(body.len(), 100);
    assert_eq!(&body[..], &data[100..200]);
}

#[tokio::test]
async fn test_media_open_range_is_capped_at_object_end() {
    let data = object_bytes(5000);
    let (app, id) = media_app(data.clone()).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=4000-")))
        .await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 4000-4999/5000");
    assert_eq!(&body[..], &data[4000..]);
}

#[tokio::test]
async fn test_media_range_past_end_is_unsatisfiable() {
    let (app, id) = media_app(object_bytes(5000)).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=5000-")))
        .await;

    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes */5000");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "RANGE_NOT_SATISFIABLE");
}

#[tokio::test]
async fn test_media_malformed_range_falls_back_to_default_window() {
    let (app, id) = media_app(object_bytes(5000)).await;

    let (status, headers, _) = app
        .send(media_request(&id.to_string(), Some("bytes=abc")))
        .await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-4999/5000");
}

#[tokio::test]
async fn test_media_unknown_id() {
    let (app, _) = media_app(object_bytes(10)).await;

    let (status, _, body) = app.send(media_request(&Uuid::new_v4().to_string(), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_media_id_validation() {
    let app = TestApp::new();

    let (status, _, _) = app.send(media_request("not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = app
        .send(Request::builder().uri("/media").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_media_signing_failure() {
    let app = TestApp::with_storage(StaticObjectStorage::failing());
    let id = app.media.add("projects/7/missing.mp4", None);

    let (status, _, body) = app.send(media_request(&id.to_string(), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "SIGNING_FAILED");
}

#[tokio::test]
async fn test_media_unreachable_storage() {
    // Bind then drop a listener so the port is very likely closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = TestApp::with_storage(StaticObjectStorage::new(format!("http://{addr}")));
    let id = app.media.add("projects/7/pour.mp4", Some("video/mp4"));

    let (status, _, body) = app.send(media_request(&id.to_string(), None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_media_upstream_refusal_is_bad_gateway() {
    let data = Arc::new(object_bytes(5000));
    let store = Router::new()
        .route(
            "/*path",
            get(|| async { StatusCode::FORBIDDEN }).head(serve_object),
        )
        .with_state(data);
    let (app, id) = media_app_with_store(store).await;

    let (status, _, body) = app.send(media_request(&id.to_string(), None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "UPSTREAM_FETCH_FAILED");
}

#[tokio::test]
async fn test_media_without_known_size_streams_whole_object() {
    let data = object_bytes(3000);
    let store = Router::new()
        .route(
            "/*path",
            get(serve_object).head(|| async { StatusCode::METHOD_NOT_ALLOWED }),
        )
        .with_state(Arc::new(data.clone()));
    let (app, id) = media_app_with_store(store).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=0-99")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_RANGE).is_none());
    assert_eq!(headers[header::CONTENT_LENGTH], "3000");
    assert_eq!(&body[..], &data[..]);
}

#[tokio::test]
async fn test_media_storage_ignoring_range_is_relayed_as_full_object() {
    let data = object_bytes(5000);
    let store = Router::new()
        .route("/*path", get(serve_whole_object))
        .with_state(Arc::new(data.clone()));
    let (app, id) = media_app_with_store(store).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=100-199")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_RANGE).is_none());
    assert_eq!(headers[header::CONTENT_LENGTH], "5000");
    assert_eq!(&body[..], &data[..]);
}

#[tokio::test]
async fn test_media_short_upstream_range_sets_headers_from_storage() {
    let data = object_bytes(5000);
    let store = Router::new()
        .route("/*path", get(serve_short_ranges))
        .with_state(Arc::new(data.clone()));
    let (app, id) = media_app_with_store(store).await;

    let (status, headers, body) = app
        .send(media_request(&id.to_string(), Some("bytes=100-199")))
        .await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-109/5000");
    assert_eq!(headers[header::CONTENT_LENGTH], "10");
    assert_eq!(&body[..], &data[100..110]);
}

#[tokio::test]
async fn test_media_row_without_storage_path_is_not_found() {
    let (app, _) = media_app(object_bytes(10)).await;

    for file_path in [None, Some("   ".to_string())] {
        let id = app.media.insert(MediaObject {
            id: Uuid::new_v4(),
            file_name: Some("orphan.mp4".to_string()),
            file_path,
            file_type: Some("video/mp4".to_string()),
        });

        let (status, _, body) = app.send(media_request(&id.to_string(), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
    }
}

//! Integration tests: build the router over in-memory collaborators and
//! drive requests through the full filter chain.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use chrono::{Duration, Utc};
use tower::ServiceExt;
use warden_api::config::ApiConfig;
use warden_api::{AppState, Collaborators};
use warden_core::auth::credentials::InMemoryDirectory;
use warden_core::auth::live::InMemoryLiveTokenStore;
use warden_core::auth::password::hash_password;
use warden_core::auth::session::SessionGrant;
use warden_core::csrf::InMemoryCsrfTokenStore;
use warden_core::models::auth::{UserProfile, UserState};
use warden_core::models::permission::{PermissionOperation, RolePermission};
use warden_core::permissions::InMemoryPermissionStore;
use warden_core::permissions::rules::RuleRegistry;

const SECRET: &[u8] = b"integration-secret-0123456789abcdef";
const ORIGIN: &str = "https://app.example.com";

struct Harness {
    app: Router,
    state: AppState,
    permissions: Arc<InMemoryPermissionStore>,
}

struct Session {
    token: String,
    csrf: String,
}

fn profile(user_id: i64, email: &str, person: Option<i64>) -> UserProfile {
    UserProfile {
        user_id,
        user_state: UserState::Active,
        email: email.into(),
        owned_person_id: person,
    }
}

fn base_rows() -> Vec<RolePermission> {
    use PermissionOperation::*;
    vec![
        RolePermission::new(Create, "USER", "POST", "/api/persons"),
        RolePermission::new(Update, "USER", "PUT", "/api/users/{id}"),
        RolePermission::new(Get, "USER", "GET", "/api/users/{id}"),
        RolePermission::new(Get, "USER", "GET", "/api/persons/{id}"),
        RolePermission::new(Get, "USER", "GET", "/api/users/me"),
        RolePermission::new(Get, "REPORTER", "GET", "/api/users/me"),
        RolePermission::new(Get, "SYSTEM_ADMIN", "GET", "/api/users/me"),
    ]
}

async fn harness() -> Harness {
    let directory = Arc::new(
        InMemoryDirectory::new()
            .with_user(
                "alice",
                hash_password("alice-pw").unwrap(),
                vec!["USER".into()],
                profile(42, "alice@x.com", Some(7)),
            )
            .with_user(
                "bob",
                hash_password("bob-pw").unwrap(),
                vec!["REPORTER".into()],
                profile(5, "bob@x.com", None),
            )
            .with_user(
                "root",
                hash_password("root-pw").unwrap(),
                vec!["SYSTEM_ADMIN".into()],
                profile(1, "root@x.com", None),
            )
            .with_user(
                "guest",
                hash_password("guest-pw").unwrap(),
                vec!["GUEST".into()],
                profile(9, "guest@x.com", None),
            ),
    );
    let permissions = Arc::new(InMemoryPermissionStore::new(base_rows()));
    let rules = RuleRegistry::load(permissions.as_ref())
        .await
        .expect("build rules");

    let config = ApiConfig {
        session_secret: SECRET.to_vec(),
        cookie_secure: false,
        cors_allowed_origins: vec![ORIGIN.into()],
        ..ApiConfig::default()
    };
    let collaborators = Collaborators {
        credentials: directory.clone(),
        profiles: directory,
        permissions: permissions.clone(),
        csrf_tokens: Arc::new(InMemoryCsrfTokenStore::new()),
        live_tokens: Arc::new(InMemoryLiveTokenStore::new()),
    };
    let state = AppState::new(config, collaborators, rules).expect("app state");

    Harness {
        app: warden_api::router(state.clone()),
        state,
        permissions,
    }
}

impl Harness {
    async fn send(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.expect("request")
    }

    async fn login(&self, username: &str, password: &str) -> Session {
        let resp = self.send(login_request(username, password)).await;
        assert_eq!(resp.status(), StatusCode::OK, "login for {username}");
        Session {
            token: set_cookie(&resp, "SESSION").expect("session cookie"),
            csrf: set_cookie(&resp, "CSRF_TOKEN").expect("csrf cookie"),
        }
    }
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    let body = serde_json::json!({ "username": username, "password": password });
    Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(method: Method, uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if !cookies.is_empty() {
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(COOKIE, header);
    }
    builder.body(Body::empty()).unwrap()
}

fn with_session(method: Method, uri: &str, session: &Session) -> Request<Body> {
    request(
        method,
        uri,
        &[("SESSION", &session.token), ("CSRF_TOKEN", &session.csrf)],
    )
}

fn set_cookie(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.to_string())
}

fn set_cookies(resp: &Response, name: &str) -> Vec<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.to_string())
        .collect()
}

async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn assert_denied(resp: Response, status: StatusCode, code: &str) {
    assert_eq!(resp.status(), status);
    let json = body_json(resp).await;
    assert_eq!(json["code"], code);
    assert!(json["id"].is_null());
}

#[tokio::test]
async fn public_endpoint_bypasses_chain() {
    let h = harness().await;
    let resp = h.send(request(Method::GET, "/actuator/health", &[])).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "UP");
}

#[tokio::test]
async fn security_headers_on_allowed_and_denied_responses() {
    let h = harness().await;
    for uri in ["/actuator/health", "/api/users/me"] {
        let resp = h.send(request(Method::GET, uri, &[])).await;
        let csp = resp
            .headers()
            .get("content-security-policy")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(csp.contains("frame-ancestors 'none'"), "{uri}: {csp}");
        assert_eq!(resp.headers()["referrer-policy"], "no-referrer");
    }
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let h = harness().await;
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/users/me")
        .header("origin", ORIGIN)
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.headers()["access-control-allow-origin"], ORIGIN);
    assert_eq!(resp.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let h = harness().await;
    let resp = h.send(request(Method::GET, "/api/users/me", &[])).await;
    assert_denied(resp, StatusCode::UNAUTHORIZED, "FUNC_SEC_AUTH_0005").await;
}

#[tokio::test]
async fn truncated_token_is_unauthorized() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    let truncated = &session.token[..session.token.len() / 2];
    let resp = h
        .send(request(Method::GET, "/api/users/me", &[("SESSION", truncated)]))
        .await;
    assert_denied(resp, StatusCode::UNAUTHORIZED, "FUNC_SEC_AUTH_0001").await;
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let h = harness().await;
    let grant = SessionGrant {
        subject: "alice".into(),
        roles: vec!["USER".into()],
        self_scoped_urls: vec!["/api/users/42".into()],
        user_id: 42,
        user_state: UserState::Active,
        email: "alice@x.com".into(),
    };
    let token = h
        .state
        .session
        .issue_at(&grant, Utc::now() - Duration::hours(3))
        .unwrap();
    let resp = h
        .send(request(Method::GET, "/api/users/me", &[("SESSION", &token)]))
        .await;
    assert_denied(resp, StatusCode::UNAUTHORIZED, "FUNC_SEC_AUTH_0004").await;
}

#[tokio::test]
async fn login_sets_cookies_and_binds_principal() {
    let h = harness().await;
    let resp = h.send(login_request("alice", "alice-pw")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let raw_cookies: Vec<String> = resp
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect();
    assert!(raw_cookies.iter().all(|c| c.contains("HttpOnly")));
    assert!(raw_cookies.iter().all(|c| c.contains("SameSite=None")));
    let token = set_cookie(&resp, "SESSION").unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["token"], token.as_str());
    assert_eq!(json["userId"], 42);

    let resp = h
        .send(request(Method::GET, "/api/users/me", &[("SESSION", &token)]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = body_json(resp).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["userId"], 42);
    assert_eq!(me["email"], "alice@x.com");
    let urls: Vec<&str> = me["selfScopedUrls"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(urls.contains(&"/api/users/42"));
    assert!(urls.contains(&"/api/persons/7"));
    assert!(urls.contains(&"/api/persons"));
}

#[tokio::test]
async fn bad_password_is_unauthorized() {
    let h = harness().await;
    let resp = h.send(login_request("alice", "wrong")).await;
    assert_denied(resp, StatusCode::UNAUTHORIZED, "FUNC_SEC_AUTH_0003").await;
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let h = harness().await;
    let session = h.login("bob", "bob-pw").await;
    let req = Request::builder()
        .uri("/api/users/me")
        .header(AUTHORIZATION, format!("Bearer {}", session.token))
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn mutating_request_without_csrf_cookie_is_forbidden() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    let resp = h
        .send(request(
            Method::POST,
            "/api/auth/refresh-jwt",
            &[("SESSION", &session.token)],
        ))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_CSRF_0001").await;
}

#[tokio::test]
async fn mutating_request_without_session_is_unauthorized() {
    let h = harness().await;
    let resp = h
        .send(request(Method::POST, "/api/auth/refresh-jwt", &[]))
        .await;
    assert_denied(resp, StatusCode::UNAUTHORIZED, "FUNC_SEC_AUTH_0005").await;
}

#[tokio::test]
async fn mutating_request_with_fresh_csrf_passes_without_rotation() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookie(&resp, "SESSION").is_some());
    assert!(set_cookie(&resp, "CSRF_TOKEN").is_none());
}

#[tokio::test]
async fn near_expiry_csrf_is_rotated() {
    let h = harness().await;
    let mut session = h.login("alice", "alice-pw").await;
    let ttl = h.state.config.csrf_ttl;
    let issued = h
        .state
        .csrf
        .issue_at("alice@x.com", Utc::now() - ttl + Duration::seconds(60))
        .await
        .unwrap();
    session.csrf = issued.code.clone();

    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated = set_cookie(&resp, "CSRF_TOKEN").expect("rotated csrf cookie");
    assert_ne!(rotated, issued.code);

    let stale = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_denied(stale, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0008").await;

    session.csrf = rotated;
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_with_near_expiry_csrf_clears_without_rotating() {
    let h = harness().await;
    let mut session = h.login("alice", "alice-pw").await;
    let ttl = h.state.config.csrf_ttl;
    let issued = h
        .state
        .csrf
        .issue_at("alice@x.com", Utc::now() - ttl + Duration::seconds(60))
        .await
        .unwrap();
    session.csrf = issued.code.clone();

    let resp = h
        .send(with_session(Method::DELETE, "/api/auth/logout", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(set_cookies(&resp, "CSRF_TOKEN"), vec![String::new()]);
    assert_eq!(set_cookie(&resp, "SESSION").as_deref(), Some(""));
    // The presented code is still the stored one: nothing was rotated.
    assert!(h.state.csrf.validate(&issued.code, "alice@x.com").await.is_ok());
}

#[tokio::test]
async fn csrf_code_of_another_user_is_forbidden() {
    let h = harness().await;
    let alice = h.login("alice", "alice-pw").await;
    let bob = h.login("bob", "bob-pw").await;
    let mixed = Session {
        token: alice.token,
        csrf: bob.csrf,
    };
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &mixed))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0008").await;
}

#[tokio::test]
async fn csrf_owner_must_match_exactly() {
    let h = harness().await;
    let mut session = h.login("alice", "alice-pw").await;
    session.csrf = h.state.csrf.issue("Alice@X.com").await.unwrap().code;
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0006").await;
}

#[tokio::test]
async fn expired_csrf_is_forbidden() {
    let h = harness().await;
    let mut session = h.login("alice", "alice-pw").await;
    session.csrf = h
        .state
        .csrf
        .issue_at("alice@x.com", Utc::now() - Duration::hours(3))
        .await
        .unwrap()
        .code;
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_CSRF_0002").await;
}

#[tokio::test]
async fn logout_without_session_is_allowed() {
    let h = harness().await;
    let resp = h
        .send(request(Method::DELETE, "/api/auth/logout", &[]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(set_cookie(&resp, "SESSION").as_deref(), Some(""));
    assert_eq!(set_cookie(&resp, "CSRF_TOKEN").as_deref(), Some(""));
}

#[tokio::test]
async fn logout_without_csrf_cookie_forgets_session() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    assert!(h.state.session.live_token("alice").is_some());
    let resp = h
        .send(request(
            Method::DELETE,
            "/api/auth/logout",
            &[("SESSION", &session.token)],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(h.state.session.live_token("alice").is_none());
}

#[tokio::test]
async fn self_scope_allows_own_ids_only() {
    let h = harness().await;
    let alice = h.login("alice", "alice-pw").await;

    for own in ["/api/users/42", "/api/persons/7"] {
        let resp = h.send(with_session(Method::GET, own, &alice)).await;
        assert_denied(resp, StatusCode::NOT_FOUND, "FUNC_COMMON_0002").await;
    }
    for foreign in ["/api/users/43", "/api/persons/8"] {
        let resp = h.send(with_session(Method::GET, foreign, &alice)).await;
        assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0002").await;
    }

    // Roles outside the self scope are not restricted to their own id.
    let bob = h.login("bob", "bob-pw").await;
    let resp = h.send(with_session(Method::GET, "/api/users/43", &bob)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn route_rule_denies_unlisted_role() {
    let h = harness().await;
    let guest = h.login("guest", "guest-pw").await;
    let resp = h
        .send(with_session(Method::GET, "/api/users/me", &guest))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0002").await;
}

#[tokio::test]
async fn rule_rebuild_requires_admin_and_applies_new_rows() {
    let h = harness().await;
    let bob = h.login("bob", "bob-pw").await;
    let root = h.login("root", "root-pw").await;
    let guest = h.login("guest", "guest-pw").await;

    let mut rows = base_rows();
    rows.push(RolePermission::new(
        PermissionOperation::Get,
        "GUEST",
        "GET",
        "/api/users/me",
    ));
    h.permissions.replace(rows).await;

    let resp = h
        .send(with_session(Method::POST, "/api/permissions/rules/rebuild", &bob))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0002").await;

    let resp = h
        .send(with_session(Method::POST, "/api/permissions/rules/rebuild", &root))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["rules"], 3);

    let resp = h
        .send(with_session(Method::GET, "/api/users/me", &guest))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_supersedes_live_token_but_old_token_still_works() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh = body_json(resp).await["token"].as_str().unwrap().to_string();
    assert_eq!(h.state.session.live_token("alice"), Some(fresh));

    let resp = h
        .send(request(
            Method::GET,
            "/api/users/me",
            &[("SESSION", &session.token)],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn csrf_endpoint_replaces_callers_token() {
    let h = harness().await;
    let session = h.login("alice", "alice-pw").await;
    let resp = h
        .send(with_session(Method::GET, "/api/auth/csrf", &session))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh = set_cookie(&resp, "CSRF_TOKEN").expect("csrf cookie");
    assert!(body_json(resp).await["expiresAt"].is_string());

    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &session))
        .await;
    assert_denied(resp, StatusCode::FORBIDDEN, "FUNC_SEC_AUTH_0008").await;

    let renewed = Session {
        token: session.token,
        csrf: fresh,
    };
    let resp = h
        .send(with_session(Method::POST, "/api/auth/refresh-jwt", &renewed))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn verification_csrf_requires_email_header() {
    let h = harness().await;
    let resp = h
        .send(request(Method::GET, "/api/verification/csrf", &[]))
        .await;
    assert_denied(resp, StatusCode::BAD_REQUEST, "FUNC_COMMON_0001").await;

    let req = Request::builder()
        .uri("/api/verification/csrf")
        .header("x-user-email", "new@x.com")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let code = set_cookie(&resp, "CSRF_TOKEN").expect("csrf cookie");
    assert!(h.state.csrf.validate(&code, "new@x.com").await.is_ok());
}

//! # warden_api
//!
//! HTTP request-authorization layer for Warden: the filter chain, auth
//! endpoints and the router that wires them together.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;
use warden_core::auth::credentials::{CredentialVerifier, UserProfileReader};
use warden_core::auth::live::LiveTokenStore;
use warden_core::auth::scope::SelfScopePolicy;
use warden_core::auth::session::SessionTokenService;
use warden_core::csrf::{CsrfTokenService, CsrfTokenStore};
use warden_core::permissions::rules::RuleRegistry;
use warden_core::permissions::{PermissionError, PermissionStore};

use crate::config::ApiConfig;
use crate::handlers::{auth, health, permissions, users};

/// External stores and readers the API is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialVerifier>,
    pub profiles: Arc<dyn UserProfileReader>,
    pub permissions: Arc<dyn PermissionStore>,
    pub csrf_tokens: Arc<dyn CsrfTokenStore>,
    pub live_tokens: Arc<dyn LiveTokenStore>,
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub session: Arc<SessionTokenService>,
    pub csrf: Arc<CsrfTokenService>,
    pub rules: Arc<RuleRegistry>,
    pub self_scope: Arc<SelfScopePolicy>,
    pub permissions: Arc<dyn PermissionStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub profiles: Arc<dyn UserProfileReader>,
}

impl AppState {
    /// Wire services from configuration, collaborators and a built rule set.
    pub fn new(
        config: ApiConfig,
        collaborators: Collaborators,
        rules: RuleRegistry,
    ) -> Result<Self, PermissionError> {
        let self_scope = SelfScopePolicy::new(&config.self_scope_roles, &config.self_scope_paths)?;
        let session = SessionTokenService::new(
            config.session_secret.clone(),
            config.session_ttl,
            collaborators.live_tokens,
        );
        let csrf = CsrfTokenService::new(
            collaborators.csrf_tokens,
            config.csrf_ttl,
            config.csrf_renew_threshold,
        );
        Ok(Self {
            config: Arc::new(config),
            session: Arc::new(session),
            csrf: Arc::new(csrf),
            rules: Arc::new(rules),
            self_scope: Arc::new(self_scope),
            permissions: collaborators.permissions,
            credentials: collaborators.credentials,
            profiles: collaborators.profiles,
        })
    }

    /// Route-layer check: may a caller with `roles` call `method path`?
    pub async fn is_authorized<S: AsRef<str>>(&self, method: &Method, path: &str, roles: &[S]) -> bool {
        self.rules.snapshot().await.is_authorized(method, path, roles)
    }
}

/// Run embedded database migrations.
///
/// Delegates to `warden_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    warden_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(origin = %origin, "ignoring invalid CORS origin"))
                .ok()
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-xsrf-token"),
            HeaderName::from_static("x-user-email"),
        ])
}

/// Builds the Axum router with all routes and shared state.
///
/// Every route, the fallback included, sits behind the filter chain; the
/// chain itself lets public endpoints through.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::DELETE_AUTH_LOGOUT, delete(auth::logout_handler))
        .route(routes::POST_AUTH_REFRESH_JWT, post(auth::refresh_handler))
        .route(routes::GET_AUTH_CSRF, get(auth::csrf_handler))
        .route(
            routes::GET_VERIFICATION_CSRF,
            get(auth::verification_csrf_handler),
        )
        .route(routes::GET_USERS_ME, get(users::me_handler))
        .route(
            routes::POST_PERMISSIONS_RULES_REBUILD,
            post(permissions::rebuild_rules_handler),
        )
        .route(routes::GET_ACTUATOR_HEALTH, get(health::health_handler))
        .fallback(handlers::not_found_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authorize_request,
        ))
        .layer(axum::middleware::map_response(
            middleware::security_headers::security_headers,
        ))
        .layer(cors)
        .with_state(state)
}

//! Request-authorization filter chain.
//!
//! Every request runs, in order:
//!
//! 1. public-endpoint bypass
//! 2. CSRF check for methods outside GET/HEAD/OPTIONS/TRACE
//! 3. session-token validation
//! 4. self-scope check for designated low-privilege roles
//! 5. principal binding, then the route rule check
//!
//! The chain fails closed: any decode or lookup error is a DENY.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use warden_core::auth::AuthError;
use warden_core::csrf::{CsrfError, Rotation};
use warden_core::models::auth::{Principal, SessionClaims};
use warden_core::models::csrf::IssuedCsrfToken;

use crate::AppState;
use crate::error::{AppError, ErrorCode};
use crate::services::cookies::{CSRF_COOKIE, SESSION_COOKIE, csrf_cookie};

/// Methods that never change state and skip the CSRF check.
pub const SAFE_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE];

/// The caller bound to a request after the chain allowed it.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub claims: SessionClaims,
    /// The session token the request presented.
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::Unauthorized(ErrorCode::TokenNotFound, "Authentication required".into())
            })
    }
}

/// How the chain let a request through.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Public endpoint; nothing was checked.
    Public,
    /// Logout without a session: nothing to bind, the handler only clears cookies.
    Anonymous,
    Authenticated(AuthenticatedUser),
}

/// Result of a successful pass through the chain.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub verdict: Verdict,
    /// Replacement CSRF token to send back when the presented one was near
    /// expiry. Always `None` on logout.
    pub rotated_csrf: Option<IssuedCsrfToken>,
}

impl ChainOutcome {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            rotated_csrf: None,
        }
    }
}

enum CsrfStep {
    /// Logout with no session left; terminal ALLOW.
    LogoutWithoutSession,
    /// Logout whose CSRF cookie already expired.
    Skipped,
    Passed(Option<IssuedCsrfToken>),
}

/// Session token from the `SESSION` cookie, or from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

fn csrf_code(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Run the chain for one request.
pub async fn evaluate(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Result<ChainOutcome, AppError> {
    if state.config.is_public(path) {
        return Ok(ChainOutcome::new(Verdict::Public));
    }

    let token = session_token(headers);

    let mut rotated_csrf = None;
    if !SAFE_METHODS.contains(method) {
        match check_csrf(state, path, token.as_deref(), headers).await? {
            CsrfStep::LogoutWithoutSession => return Ok(ChainOutcome::new(Verdict::Anonymous)),
            CsrfStep::Skipped => {}
            CsrfStep::Passed(rotation) => rotated_csrf = rotation,
        }
    }

    let token = token.ok_or(AuthError::TokenNotFound)?;
    let principal = state
        .session
        .decode_principal(&token)
        .ok_or_else(|| AuthError::TokenMalformed("no principal in session token".into()))?;
    let claims = state.session.check(&token, &principal.username)?;

    state
        .self_scope
        .check(path, &claims.roles, &claims.self_scoped_urls)?;

    let rules = state.rules.snapshot().await;
    if !rules.is_authorized(method, path, &claims.roles) {
        return Err(AppError::Forbidden(
            ErrorCode::UriForbidden,
            format!("{method} {path} is not allowed for the caller's roles"),
        ));
    }

    Ok(ChainOutcome {
        verdict: Verdict::Authenticated(AuthenticatedUser {
            principal,
            claims,
            token,
        }),
        rotated_csrf,
    })
}

async fn check_csrf(
    state: &AppState,
    path: &str,
    token: Option<&str>,
    headers: &HeaderMap,
) -> Result<CsrfStep, AppError> {
    let logout = state.config.is_logout(path);
    let Some(token) = token else {
        if logout {
            return Ok(CsrfStep::LogoutWithoutSession);
        }
        return Err(AuthError::TokenNotFound.into());
    };
    let Some(code) = csrf_code(headers) else {
        if logout {
            debug!("logout without CSRF cookie");
            return Ok(CsrfStep::Skipped);
        }
        return Err(CsrfError::NotFound.into());
    };

    // The email is read from a signature-checked token, not a raw claim.
    let email = state.session.extract_email(token)?;
    let current = state.csrf.validate(&code, &email).await?;
    if logout {
        // Logout clears the CSRF cookie; a rotated one would outlive it.
        return Ok(CsrfStep::Passed(None));
    }
    match state.csrf.rotate_if_near_expiry(current).await? {
        Rotation::Unchanged(_) => Ok(CsrfStep::Passed(None)),
        Rotation::Rotated(issued) => Ok(CsrfStep::Passed(Some(issued))),
    }
}

/// Axum middleware running [`evaluate`] and binding the caller into request
/// extensions. Appends a `Set-Cookie` for a rotated CSRF token. Logout never
/// rotates.
pub async fn authorize_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let outcome = evaluate(&state, &method, &path, request.headers())
        .await
        .inspect_err(|e| match e {
            AppError::Internal(_) => warn!(%method, %path, error = %e, "request denied"),
            _ => debug!(%method, %path, code = e.code().as_str(), "request denied"),
        })?;

    if let Verdict::Authenticated(user) = outcome.verdict {
        debug!(%method, %path, subject = %user.principal.username, "request allowed");
        request.extensions_mut().insert(user);
    }

    let mut response = next.run(request).await;

    if let Some(issued) = outcome.rotated_csrf {
        let cookie = csrf_cookie(&state.config, &issued.code);
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| AppError::Internal(format!("csrf cookie header: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);
    }

    Ok(response)
}

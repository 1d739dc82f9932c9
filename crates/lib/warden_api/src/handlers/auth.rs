//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use chrono::SecondsFormat;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthenticatedUser, session_token};
use crate::models::{AuthResponse, CsrfResponse, LoginRequest, LogoutResponse};
use crate::services::auth;
use crate::services::cookies::{
    CSRF_COOKIE, SESSION_COOKIE, clear_cookie, csrf_cookie, session_cookie,
};

/// Header naming the caller when no session exists yet.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// `POST /api/auth/login`
///
/// Authenticate and set the session and CSRF cookies.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = auth::login(&state, &body.username, &body.password).await?;
    let csrf = auth::issue_csrf(&state, &session.email).await?;
    let jar = jar
        .add(session_cookie(&state.config, &session.token))
        .add(csrf_cookie(&state.config, &csrf.code));
    Ok((
        jar,
        Json(AuthResponse {
            token: session.token,
            user_id: session.user_id,
        }),
    ))
}

/// `DELETE /api/auth/logout`
///
/// Forget the session and clear both cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    auth::logout(&state, session_token(&headers).as_deref());
    let jar = jar
        .add(clear_cookie(&state.config, SESSION_COOKIE))
        .add(clear_cookie(&state.config, CSRF_COOKIE));
    (
        jar,
        Json(LogoutResponse {
            message: "Logged out".into(),
        }),
    )
}

/// `POST /api/auth/refresh-jwt`
///
/// Replace the session token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = auth::refresh(&state, &user).await?;
    let jar = jar.add(session_cookie(&state.config, &session.token));
    Ok((
        jar,
        Json(AuthResponse {
            token: session.token,
            user_id: session.user_id,
        }),
    ))
}

/// `GET /api/auth/csrf`
///
/// Issue a CSRF token for the caller's email.
pub async fn csrf_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<CsrfResponse>)> {
    issue_csrf_cookie(&state, &user.claims.email, jar).await
}

/// `GET /api/verification/csrf`
///
/// Issue a CSRF token for the email in `X-USER-EMAIL`, for flows that run
/// before a session exists.
pub async fn verification_csrf_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<CsrfResponse>)> {
    let email = headers
        .get(USER_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| v.contains('@'))
        .ok_or_else(|| AppError::Validation("X-USER-EMAIL header with an email is required".into()))?
        .to_string();
    issue_csrf_cookie(&state, &email, jar).await
}

async fn issue_csrf_cookie(
    state: &AppState,
    email: &str,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<CsrfResponse>)> {
    let issued = auth::issue_csrf(state, email).await?;
    let jar = jar.add(csrf_cookie(&state.config, &issued.code));
    Ok((
        jar,
        Json(CsrfResponse {
            expires_at: issued
                .token
                .expiration_date
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    ))
}

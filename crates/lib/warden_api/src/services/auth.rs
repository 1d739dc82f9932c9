//! Auth service: login, refresh and logout orchestration.

use tracing::{info, warn};
use warden_core::auth::AuthError;
use warden_core::auth::scope::materialize_self_scoped_urls;
use warden_core::auth::session::SessionGrant;
use warden_core::models::auth::UserProfile;
use warden_core::models::csrf::IssuedCsrfToken;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

/// A freshly minted session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: i64,
    pub email: String,
}

/// Build the grant for `username`: self-scoped URLs are recomputed from the
/// current permission store and profile.
async fn build_grant(
    state: &AppState,
    username: &str,
    roles: Vec<String>,
    profile: &UserProfile,
) -> AppResult<SessionGrant> {
    let resources = state.permissions.resources_for_roles(&roles).await?;
    let self_scoped_urls =
        materialize_self_scoped_urls(&resources, &roles, &state.config.self_scope_roles, profile);
    Ok(SessionGrant {
        subject: username.to_string(),
        roles,
        self_scoped_urls,
        user_id: profile.user_id,
        user_state: profile.user_state,
        email: profile.email.clone(),
    })
}

async fn load_profile(state: &AppState, username: &str) -> AppResult<UserProfile> {
    let profile = state
        .profiles
        .find_profile(username)
        .await?
        .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;
    Ok(profile)
}

/// Verify credentials and issue a session token.
pub async fn login(state: &AppState, username: &str, password: &str) -> AppResult<IssuedSession> {
    let principal = state
        .credentials
        .verify(username, password)
        .await
        .inspect_err(|e| warn!(username = %username, error = %e, "login rejected"))?;
    let profile = load_profile(state, &principal.username).await?;
    let grant = build_grant(state, &principal.username, principal.roles, &profile).await?;
    let token = state.session.issue(&grant)?;
    info!(subject = %grant.subject, "login succeeded");
    Ok(IssuedSession {
        token,
        user_id: profile.user_id,
        email: profile.email,
    })
}

/// Supersede the caller's token with a fresh one.
///
/// Roles come from the presented token; profile data and self-scoped URLs
/// are re-read. The old token is dropped from the live cache but stays
/// valid until it expires.
pub async fn refresh(state: &AppState, user: &AuthenticatedUser) -> AppResult<IssuedSession> {
    let username = &user.principal.username;
    let profile = load_profile(state, username).await?;
    let grant = build_grant(state, username, user.claims.roles.clone(), &profile).await?;
    state.session.invalidate(&user.token);
    let token = state.session.issue(&grant)?;
    info!(subject = %username, "session refreshed");
    Ok(IssuedSession {
        token,
        user_id: profile.user_id,
        email: profile.email,
    })
}

/// Forget the presented token, if any. Never fails.
pub fn logout(state: &AppState, token: Option<&str>) {
    match token {
        Some(token) => state.session.invalidate(token),
        None => info!("logout without a session token"),
    }
}

/// Issue a CSRF token for `email`.
pub async fn issue_csrf(state: &AppState, email: &str) -> AppResult<IssuedCsrfToken> {
    Ok(state.csrf.issue(email).await?)
}

//! Session token service: issue, validate, decode and invalidate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt;
use super::live::LiveTokenStore;
use crate::models::auth::{Principal, SessionClaims, UserState};

/// Default session lifetime: 2 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

/// Everything a session token is minted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub subject: String,
    pub roles: Vec<String>,
    pub self_scoped_urls: Vec<String>,
    pub user_id: i64,
    pub user_state: UserState,
    pub email: String,
}

/// Issues and checks signed session tokens.
///
/// Keeps the last issued token per subject in a [`LiveTokenStore`].
/// `validate` deliberately does not consult that store: a superseded or
/// logged-out token keeps passing until it expires.
pub struct SessionTokenService {
    secret: Vec<u8>,
    ttl: Duration,
    live: Arc<dyn LiveTokenStore>,
}

impl SessionTokenService {
    pub fn new(secret: Vec<u8>, ttl: Duration, live: Arc<dyn LiveTokenStore>) -> Self {
        Self { secret, ttl, live }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `grant` and record it as the subject's live token.
    pub fn issue(&self, grant: &SessionGrant) -> Result<String, AuthError> {
        self.issue_at(grant, Utc::now())
    }

    pub fn issue_at(&self, grant: &SessionGrant, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sub: grant.subject.clone(),
            roles: grant.roles.clone(),
            self_scoped_urls: grant.self_scoped_urls.clone(),
            user_id: grant.user_id,
            user_state: grant.user_state,
            email: grant.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = jwt::sign(&claims, &self.secret)?;
        self.live.put(&grant.subject, &token);
        debug!(subject = %grant.subject, exp = claims.exp, "issued session token");
        Ok(token)
    }

    /// Fail-closed validity check: signature, structure, expiry and subject.
    pub fn validate(&self, token: &str, expected_subject: &str) -> bool {
        self.validate_at(token, expected_subject, Utc::now())
    }

    pub fn validate_at(&self, token: &str, expected_subject: &str, now: DateTime<Utc>) -> bool {
        match self.check_at(token, expected_subject, now) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "session token rejected");
                false
            }
        }
    }

    /// Like [`validate`](Self::validate) but reports why a token failed.
    pub fn check(&self, token: &str, expected_subject: &str) -> Result<SessionClaims, AuthError> {
        self.check_at(token, expected_subject, Utc::now())
    }

    pub fn check_at(
        &self,
        token: &str,
        expected_subject: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthError> {
        let claims = jwt::verify_at(token, &self.secret, now)?;
        if claims.sub != expected_subject {
            return Err(AuthError::SubjectMismatch);
        }
        Ok(claims)
    }

    /// Subject and roles from a correctly signed token, regardless of expiry.
    ///
    /// `None` when the token does not decode or names no subject.
    pub fn decode_principal(&self, token: &str) -> Option<Principal> {
        match jwt::decode_claims(token, &self.secret) {
            Ok(claims) if !claims.sub.is_empty() => Some(claims.principal()),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "could not decode principal");
                None
            }
        }
    }

    /// Forget the live token for the token's subject.
    ///
    /// An undecodable token is logged and ignored; the caller's intent (end
    /// the session) is met by clearing cookies anyway.
    pub fn invalidate(&self, token: &str) {
        match jwt::decode_claims(token, &self.secret) {
            Ok(claims) => {
                self.live.remove(&claims.sub);
                info!(subject = %claims.sub, "session token invalidated");
            }
            Err(e) => warn!(error = %e, "attempt to invalidate an undecodable session token"),
        }
    }

    /// The token currently recorded for `subject`.
    pub fn live_token(&self, subject: &str) -> Option<String> {
        self.live.get(subject)
    }

    /// All claims of a live, correctly signed token.
    pub fn extract_claims(&self, token: &str) -> Result<SessionClaims, AuthError> {
        jwt::verify(token, &self.secret)
    }

    pub fn extract_user_id(&self, token: &str) -> Result<i64, AuthError> {
        self.extract_claims(token).map(|c| c.user_id)
    }

    pub fn extract_user_state(&self, token: &str) -> Result<UserState, AuthError> {
        self.extract_claims(token).map(|c| c.user_state)
    }

    pub fn extract_email(&self, token: &str) -> Result<String, AuthError> {
        self.extract_claims(token).map(|c| c.email)
    }

    pub fn extract_roles(&self, token: &str) -> Result<Vec<String>, AuthError> {
        self.extract_claims(token).map(|c| c.roles)
    }

    pub fn extract_self_scoped_urls(&self, token: &str) -> Result<Vec<String>, AuthError> {
        self.extract_claims(token).map(|c| c.self_scoped_urls)
    }
}

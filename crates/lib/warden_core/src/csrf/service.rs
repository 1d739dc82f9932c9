//! CSRF token issuance, validation and near-expiry rotation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CsrfError, CsrfTokenStore};
use crate::models::csrf::{CsrfToken, IssuedCsrfToken};

/// Default CSRF lifetime: 2 hours.
pub const DEFAULT_CSRF_TTL_SECS: i64 = 2 * 60 * 60;

/// Default renewal threshold: 10 minutes.
pub const DEFAULT_RENEW_THRESHOLD_SECS: i64 = 10 * 60;

/// Generate a random code (64 alphanumeric chars).
fn generate_code() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a code for storage.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of [`CsrfTokenService::rotate_if_near_expiry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// Not near expiry; the token is returned as is.
    Unchanged(CsrfToken),
    /// A replacement was issued; its code must go out in a new cookie.
    Rotated(IssuedCsrfToken),
}

pub struct CsrfTokenService {
    store: Arc<dyn CsrfTokenStore>,
    ttl: Duration,
    renew_threshold: Duration,
}

impl CsrfTokenService {
    pub fn new(store: Arc<dyn CsrfTokenStore>, ttl: Duration, renew_threshold: Duration) -> Self {
        Self {
            store,
            ttl,
            renew_threshold,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `owner_email`, replacing any previous one.
    pub async fn issue(&self, owner_email: &str) -> Result<IssuedCsrfToken, CsrfError> {
        self.issue_at(owner_email, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        owner_email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedCsrfToken, CsrfError> {
        let code = generate_code();
        let token = CsrfToken {
            code_hash: hash_code(&code),
            owner_email: owner_email.trim().to_string(),
            expiration_date: now + self.ttl,
        };
        self.store.upsert(&token).await?;
        debug!(owner = %token.owner_email, expires = %token.expiration_date, "issued CSRF token");
        Ok(IssuedCsrfToken { code, token })
    }

    pub async fn validate(&self, code: &str, owner_email: &str) -> Result<CsrfToken, CsrfError> {
        self.validate_at(code, owner_email, Utc::now()).await
    }

    /// Look the token up by owner and check owner, code and expiry.
    pub async fn validate_at(
        &self,
        code: &str,
        owner_email: &str,
        now: DateTime<Utc>,
    ) -> Result<CsrfToken, CsrfError> {
        let token = self
            .store
            .find_by_owner(owner_email)
            .await?
            .ok_or(CsrfError::NotFound)?;
        if token.owner_email != owner_email.trim() {
            return Err(CsrfError::EmailMismatch);
        }
        if token.code_hash != hash_code(code) {
            return Err(CsrfError::CodeMismatch);
        }
        if now >= token.expiration_date {
            return Err(CsrfError::Expired);
        }
        Ok(token)
    }

    /// True when `0 < expiration - now <= renew_threshold`.
    pub fn is_near_expiry_at(&self, token: &CsrfToken, now: DateTime<Utc>) -> bool {
        let remaining = token.expiration_date - now;
        remaining > Duration::zero() && remaining <= self.renew_threshold
    }

    pub async fn rotate_if_near_expiry(&self, token: CsrfToken) -> Result<Rotation, CsrfError> {
        self.rotate_if_near_expiry_at(token, Utc::now()).await
    }

    pub async fn rotate_if_near_expiry_at(
        &self,
        token: CsrfToken,
        now: DateTime<Utc>,
    ) -> Result<Rotation, CsrfError> {
        if !self.is_near_expiry_at(&token, now) {
            return Ok(Rotation::Unchanged(token));
        }
        debug!(owner = %token.owner_email, "rotating CSRF token near expiry");
        let issued = self.issue_at(&token.owner_email, now).await?;
        Ok(Rotation::Rotated(issued))
    }

    /// Drop the owner's token.
    pub async fn revoke(&self, owner_email: &str) -> Result<(), CsrfError> {
        self.store.delete_by_owner(owner_email).await
    }
}

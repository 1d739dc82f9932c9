//! Double-submit CSRF tokens bound to the caller's email.
//!
//! The plaintext code lives only in the client cookie; the store keeps its
//! SHA-256 hash, one row per owner email.

pub mod queries;
pub mod service;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::csrf::CsrfToken;

pub use service::{CsrfTokenService, Rotation};

/// CSRF errors.
#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("CSRF token not found")]
    NotFound,

    #[error("CSRF token belongs to another user")]
    EmailMismatch,

    #[error("CSRF code does not match")]
    CodeMismatch,

    #[error("CSRF token has expired")]
    Expired,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Persistence for CSRF tokens, keyed case-insensitively by owner email.
#[async_trait]
pub trait CsrfTokenStore: Send + Sync {
    async fn find_by_owner(&self, email: &str) -> Result<Option<CsrfToken>, CsrfError>;

    /// Insert or replace the owner's token. Last writer wins.
    async fn upsert(&self, token: &CsrfToken) -> Result<(), CsrfError>;

    async fn delete_by_owner(&self, email: &str) -> Result<(), CsrfError>;
}

/// Process-local [`CsrfTokenStore`].
#[derive(Debug, Default)]
pub struct InMemoryCsrfTokenStore {
    tokens: Mutex<HashMap<String, CsrfToken>>,
}

impl InMemoryCsrfTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owner_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl CsrfTokenStore for InMemoryCsrfTokenStore {
    async fn find_by_owner(&self, email: &str) -> Result<Option<CsrfToken>, CsrfError> {
        Ok(self.tokens.lock().await.get(&owner_key(email)).cloned())
    }

    async fn upsert(&self, token: &CsrfToken) -> Result<(), CsrfError> {
        self.tokens
            .lock()
            .await
            .insert(owner_key(&token.owner_email), token.clone());
        Ok(())
    }

    async fn delete_by_owner(&self, email: &str) -> Result<(), CsrfError> {
        self.tokens.lock().await.remove(&owner_key(email));
        Ok(())
    }
}

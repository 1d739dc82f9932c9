//! Authentication: session tokens, credentials and self-scope data.
//!
//! The signed session token is the only credential the request pipeline
//! trusts. Collaborators that own users and profiles are reached through the
//! traits in [`credentials`].

pub mod credentials;
pub mod jwt;
pub mod live;
pub mod password;
pub mod queries;
pub mod scope;
pub mod session;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session token not found")]
    TokenNotFound,

    #[error("Malformed session token: {0}")]
    TokenMalformed(String),

    #[error("Session token signature is invalid")]
    SignatureInvalid,

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Session token subject does not match")]
    SubjectMismatch,

    #[error("Resource is outside the caller's own scope")]
    ForbiddenSelfScope,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! bodies in `warden_api::models` (which carry camelCase renames for clients).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a user account, embedded in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserState {
    /// Account exists but the person profile is not filled in yet.
    IncompleteProfile,
    Active,
    Disabled,
    Locked,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::IncompleteProfile => "INCOMPLETE_PROFILE",
            UserState::Active => "ACTIVE",
            UserState::Disabled => "DISABLED",
            UserState::Locked => "LOCKED",
        }
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored user state is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user state '{0}'")]
pub struct UnknownUserState(pub String);

impl FromStr for UserState {
    type Err = UnknownUserState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOMPLETE_PROFILE" => Ok(UserState::IncompleteProfile),
            "ACTIVE" => Ok(UserState::Active),
            "DISABLED" => Ok(UserState::Disabled),
            "LOCKED" => Ok(UserState::Locked),
            other => Err(UnknownUserState(other.to_string())),
        }
    }
}

/// An authenticated caller: subject plus granted role names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            username: username.into(),
            roles,
        }
    }

    /// True when the principal holds at least one of `roles`.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles
            .iter()
            .any(|wanted| self.roles.iter().any(|r| r == wanted.as_ref()))
    }
}

/// Profile data needed to mint a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: i64,
    pub user_state: UserState,
    pub email: String,
    /// Id of the person record owned by this user, if one exists.
    pub owned_person_id: Option<i64>,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Subject: the username.
    pub sub: String,
    pub roles: Vec<String>,
    pub self_scoped_urls: Vec<String>,
    pub user_id: i64,
    pub user_state: UserState,
    pub email: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl SessionClaims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.clone(), self.roles.clone())
    }
}

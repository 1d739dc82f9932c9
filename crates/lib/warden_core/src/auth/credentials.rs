//! Collaborator seams for login: credential verification and profile lookup.

use std::collections::HashMap;

use async_trait::async_trait;

use super::AuthError;
use super::password::verify_password;
use crate::models::auth::{Principal, UserProfile};

/// Checks a username/password pair and yields the caller's principal.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthError>;
}

/// Reads the profile data a session token is minted from.
#[async_trait]
pub trait UserProfileReader: Send + Sync {
    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>, AuthError>;
}

/// A user held by [`InMemoryDirectory`].
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub password_hash: String,
    pub roles: Vec<String>,
    pub profile: UserProfile,
}

/// Fixed user directory implementing both collaborator traits.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: HashMap<String, DirectoryUser>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user; `password_hash` is a bcrypt hash.
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        roles: Vec<String>,
        profile: UserProfile,
    ) -> Self {
        self.users.insert(
            username.into(),
            DirectoryUser {
                password_hash: password_hash.into(),
                roles,
                profile,
            },
        );
        self
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let user = self.users.get(username).ok_or(AuthError::CredentialError)?;
        if verify_password(password, &user.password_hash)? {
            Ok(Principal::new(username, user.roles.clone()))
        } else {
            Err(AuthError::CredentialError)
        }
    }
}

#[async_trait]
impl UserProfileReader for InMemoryDirectory {
    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>, AuthError> {
        Ok(self.users.get(username).map(|u| u.profile.clone()))
    }
}

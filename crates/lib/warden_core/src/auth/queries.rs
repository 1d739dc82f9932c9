//! Auth-related database queries.
//!
//! Users and roles belong to the administration service; this module only
//! reads `users(id, username, email, password, state, person_id)`,
//! `roles(id, name)` and `role_user(user_id, role_id)`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::AuthError;
use super::credentials::{CredentialVerifier, UserProfileReader};
use super::password::verify_password;
use crate::models::auth::{Principal, UserProfile, UserState};

/// Fetch a user's password hash by username.
pub async fn find_password_hash(pool: &PgPool, username: &str) -> Result<Option<String>, AuthError> {
    let row = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Fetch role names for a user.
pub async fn get_user_roles(pool: &PgPool, username: &str) -> Result<Vec<String>, AuthError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT r.name FROM role_user ru \
         JOIN roles r ON r.id = ru.role_id \
         JOIN users u ON u.id = ru.user_id \
         WHERE u.username = $1 \
         ORDER BY r.name",
    )
    .bind(username)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch `(id, state, email, person_id)` for a user.
pub async fn find_profile_row(
    pool: &PgPool,
    username: &str,
) -> Result<Option<(i64, String, String, Option<i64>)>, AuthError> {
    let row = sqlx::query_as::<_, (i64, String, String, Option<i64>)>(
        "SELECT id, state, email, person_id FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Postgres-backed [`CredentialVerifier`] and [`UserProfileReader`].
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialVerifier for PgDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let Some(hash) = find_password_hash(&self.pool, username).await? else {
            debug!(username = %username, "login for unknown user");
            return Err(AuthError::CredentialError);
        };
        if !verify_password(password, &hash)? {
            return Err(AuthError::CredentialError);
        }
        let roles = get_user_roles(&self.pool, username).await?;
        Ok(Principal::new(username, roles))
    }
}

#[async_trait]
impl UserProfileReader for PgDirectory {
    async fn find_profile(&self, username: &str) -> Result<Option<UserProfile>, AuthError> {
        let Some((user_id, state, email, owned_person_id)) =
            find_profile_row(&self.pool, username).await?
        else {
            return Ok(None);
        };
        let user_state = state.parse::<UserState>().map_err(|e| {
            warn!(username = %username, error = %e, "stored user state not recognised");
            AuthError::Internal(e.to_string())
        })?;
        Ok(Some(UserProfile {
            user_id,
            user_state,
            email,
            owned_person_id,
        }))
    }
}

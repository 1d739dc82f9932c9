//! CSRF token persistence in Postgres (`csrf_tokens`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CsrfError, CsrfTokenStore};
use crate::models::csrf::CsrfToken;

/// Fetch `(code_hash, owner_email, expiration_date)` for an owner.
pub async fn find_csrf_token(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(String, String, DateTime<Utc>)>, CsrfError> {
    let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
        "SELECT code_hash, owner_email, expiration_date FROM csrf_tokens \
         WHERE lower(owner_email) = lower($1)",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert or replace the owner's token.
pub async fn upsert_csrf_token(pool: &PgPool, token: &CsrfToken) -> Result<(), CsrfError> {
    sqlx::query(
        "INSERT INTO csrf_tokens (code_hash, owner_email, expiration_date) \
         VALUES ($1, $2, $3) \
         ON CONFLICT ((lower(owner_email))) DO UPDATE \
         SET code_hash = EXCLUDED.code_hash, \
             owner_email = EXCLUDED.owner_email, \
             expiration_date = EXCLUDED.expiration_date, \
             updated_at = now()",
    )
    .bind(&token.code_hash)
    .bind(&token.owner_email)
    .bind(token.expiration_date)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_csrf_token(pool: &PgPool, email: &str) -> Result<(), CsrfError> {
    sqlx::query("DELETE FROM csrf_tokens WHERE lower(owner_email) = lower($1)")
        .bind(email.trim())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete rows whose expiry has passed. Returns the number removed.
pub async fn delete_expired_csrf_tokens(pool: &PgPool) -> Result<u64, CsrfError> {
    let result = sqlx::query("DELETE FROM csrf_tokens WHERE expiration_date <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// [`CsrfTokenStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgCsrfTokenStore {
    pool: PgPool,
}

impl PgCsrfTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CsrfTokenStore for PgCsrfTokenStore {
    async fn find_by_owner(&self, email: &str) -> Result<Option<CsrfToken>, CsrfError> {
        let row = find_csrf_token(&self.pool, email).await?;
        Ok(row.map(|(code_hash, owner_email, expiration_date)| CsrfToken {
            code_hash,
            owner_email,
            expiration_date,
        }))
    }

    async fn upsert(&self, token: &CsrfToken) -> Result<(), CsrfError> {
        upsert_csrf_token(&self.pool, token).await
    }

    async fn delete_by_owner(&self, email: &str) -> Result<(), CsrfError> {
        delete_csrf_token(&self.pool, email).await
    }
}

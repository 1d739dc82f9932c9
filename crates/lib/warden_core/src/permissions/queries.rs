//! Postgres reader for role/permission assignments.
//!
//! Reads tables owned by the user/role administration service:
//! `roles(id, name)`, `permissions(id, name, method, resource, operation)`
//! and `role_permission(role_id, permission_id)`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use super::{PermissionError, PermissionStore};
use crate::models::permission::{PermissionOperation, RolePermission};

/// Fetch every assignment as `(operation, role, method, resource)`, ordered by role name.
pub async fn find_all_role_permissions(
    pool: &PgPool,
) -> Result<Vec<(String, String, String, String)>, PermissionError> {
    let rows = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT p.operation, r.name, p.method, p.resource \
         FROM role_permission rp \
         JOIN roles r ON r.id = rp.role_id \
         JOIN permissions p ON p.id = rp.permission_id \
         ORDER BY r.name, p.id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch the distinct resources granted to any of `roles`.
pub async fn find_resources_by_role_names(
    pool: &PgPool,
    roles: &[String],
) -> Result<Vec<String>, PermissionError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT p.resource \
         FROM role_permission rp \
         JOIN roles r ON r.id = rp.role_id \
         JOIN permissions p ON p.id = rp.permission_id \
         WHERE r.name = ANY($1) \
         GROUP BY p.resource \
         ORDER BY MIN(p.id)",
    )
    .bind(roles)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// [`PermissionStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn role_permissions(&self) -> Result<Vec<RolePermission>, PermissionError> {
        let rows = find_all_role_permissions(&self.pool).await?;
        rows.into_iter()
            .map(|(operation, role, method, resource)| {
                let op = operation.parse::<PermissionOperation>().map_err(|e| {
                    warn!(role = %role, resource = %resource, error = %e, "unclassified permission");
                    PermissionError::RuleBuildFailure(e.to_string())
                })?;
                Ok(RolePermission::new(op, role, method, resource))
            })
            .collect()
    }

    async fn resources_for_roles(&self, roles: &[String]) -> Result<Vec<String>, PermissionError> {
        find_resources_by_role_names(&self.pool, roles).await
    }
}

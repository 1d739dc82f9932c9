//! Permission rules: the role ↔ permission ↔ operation snapshot and the
//! request-authorization rule set built from it.

pub mod pattern;
pub mod queries;
pub mod rules;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::permission::RolePermission;

/// Permission errors.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Failed to build permission rules: {0}")]
    RuleBuildFailure(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Reader of the persisted role/permission assignments.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Every `(operation, role, method, resource)` assignment.
    async fn role_permissions(&self) -> Result<Vec<RolePermission>, PermissionError>;

    /// Distinct resources granted to any of `roles`, in first-seen order.
    async fn resources_for_roles(&self, roles: &[String]) -> Result<Vec<String>, PermissionError>;
}

/// [`PermissionStore`] over an in-memory snapshot.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    rows: RwLock<Vec<RolePermission>>,
}

impl InMemoryPermissionStore {
    pub fn new(rows: Vec<RolePermission>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Swap the stored assignments.
    pub async fn replace(&self, rows: Vec<RolePermission>) {
        *self.rows.write().await = rows;
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn role_permissions(&self) -> Result<Vec<RolePermission>, PermissionError> {
        Ok(self.rows.read().await.clone())
    }

    async fn resources_for_roles(&self, roles: &[String]) -> Result<Vec<String>, PermissionError> {
        let rows = self.rows.read().await;
        let mut resources: Vec<String> = Vec::new();
        for row in rows.iter().filter(|r| roles.contains(&r.role)) {
            if !resources.contains(&row.resource) {
                resources.push(row.resource.clone());
            }
        }
        Ok(resources)
    }
}

//! Role/permission snapshot models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse CRUD category a permission belongs to.
///
/// Declaration order is the order in which rules are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionOperation {
    Create,
    Update,
    Delete,
    List,
    Get,
    Head,
    Options,
    Trace,
}

impl PermissionOperation {
    pub const ALL: [PermissionOperation; 8] = [
        PermissionOperation::Create,
        PermissionOperation::Update,
        PermissionOperation::Delete,
        PermissionOperation::List,
        PermissionOperation::Get,
        PermissionOperation::Head,
        PermissionOperation::Options,
        PermissionOperation::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionOperation::Create => "CREATE",
            PermissionOperation::Update => "UPDATE",
            PermissionOperation::Delete => "DELETE",
            PermissionOperation::List => "LIST",
            PermissionOperation::Get => "GET",
            PermissionOperation::Head => "HEAD",
            PermissionOperation::Options => "OPTIONS",
            PermissionOperation::Trace => "TRACE",
        }
    }
}

impl fmt::Display for PermissionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for PermissionOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionOperation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// One row of the role ↔ permission ↔ operation mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub operation: PermissionOperation,
    pub role: String,
    /// HTTP method as stored (any case).
    pub method: String,
    /// Resource pattern, possibly with a `{id}` placeholder.
    pub resource: String,
}

impl RolePermission {
    pub fn new(
        operation: PermissionOperation,
        role: impl Into<String>,
        method: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            role: role.into(),
            method: method.into(),
            resource: resource.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_round_trips_through_str() {
        for op in PermissionOperation::ALL {
            assert_eq!(op.as_str().parse::<PermissionOperation>(), Ok(op));
        }
        assert_eq!("list".parse(), Ok(PermissionOperation::List));
        assert!("PATCH".parse::<PermissionOperation>().is_err());
    }
}

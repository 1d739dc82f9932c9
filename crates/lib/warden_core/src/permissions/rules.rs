//! Request-authorization rules built from the role/permission snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::Method;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::pattern::PathPattern;
use super::{PermissionError, PermissionStore};
use crate::models::permission::{PermissionOperation, RolePermission};

/// A single `(method, pattern)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMatcher {
    pub method: Method,
    pub pattern: PathPattern,
}

impl RequestMatcher {
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.pattern.matches(path)
    }
}

/// All matchers of one operation and the roles allowed through them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRule {
    pub operation: PermissionOperation,
    pub matchers: Vec<RequestMatcher>,
    pub allowed_roles: Vec<String>,
}

impl OperationRule {
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(method, path))
    }

    pub fn allows<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles
            .iter()
            .any(|r| self.allowed_roles.iter().any(|a| a == r.as_ref()))
    }
}

/// Immutable rule snapshot, one rule per operation that has permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<OperationRule>,
}

impl RuleSet {
    /// No restrictions: every authenticated caller passes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build rules from a role/permission snapshot.
    ///
    /// Rows are grouped by operation and registered in
    /// [`PermissionOperation::ALL`] order. Matchers and roles are
    /// deduplicated keeping first-seen input order.
    pub fn build(snapshot: &[RolePermission]) -> Result<Self, PermissionError> {
        let mut grouped: BTreeMap<PermissionOperation, Vec<&RolePermission>> = BTreeMap::new();
        for row in snapshot {
            grouped.entry(row.operation).or_default().push(row);
        }

        let mut rules = Vec::new();
        for operation in PermissionOperation::ALL {
            let Some(rows) = grouped.get(&operation) else {
                continue;
            };
            let mut matchers: Vec<RequestMatcher> = Vec::new();
            let mut allowed_roles: Vec<String> = Vec::new();
            for row in rows {
                let matcher = RequestMatcher {
                    method: parse_method(&row.method)?,
                    pattern: PathPattern::parse(&row.resource)?,
                };
                if !matchers.contains(&matcher) {
                    matchers.push(matcher);
                }
                if !allowed_roles.contains(&row.role) {
                    allowed_roles.push(row.role.clone());
                }
            }
            debug!(
                operation = %operation,
                matchers = matchers.len(),
                roles = ?allowed_roles,
                "registered operation rule"
            );
            rules.push(OperationRule {
                operation,
                matchers,
                allowed_roles,
            });
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[OperationRule] {
        &self.rules
    }

    pub fn rule_for(&self, operation: PermissionOperation) -> Option<&OperationRule> {
        self.rules.iter().find(|r| r.operation == operation)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule matching `(method, path)` decides. No match means the
    /// route only requires authentication.
    pub fn is_authorized<S: AsRef<str>>(&self, method: &Method, path: &str, roles: &[S]) -> bool {
        match self.rules.iter().find(|r| r.matches(method, path)) {
            Some(rule) => rule.allows(roles),
            None => true,
        }
    }
}

fn parse_method(raw: &str) -> Result<Method, PermissionError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        "TRACE" => Ok(Method::TRACE),
        other => Err(PermissionError::RuleBuildFailure(format!(
            "unknown HTTP method '{other}'"
        ))),
    }
}

/// Holder of the current [`RuleSet`], swapped atomically on rebuild.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleRegistry {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// Build the initial registry from a store. Failure is fatal to the caller.
    pub async fn load(store: &dyn PermissionStore) -> Result<Self, PermissionError> {
        let snapshot = store.role_permissions().await?;
        let rules = RuleSet::build(&snapshot)?;
        info!(rules = rules.len(), rows = snapshot.len(), "permission rules built");
        Ok(Self::new(rules))
    }

    pub async fn snapshot(&self) -> Arc<RuleSet> {
        self.current.read().await.clone()
    }

    /// Re-read the store and swap in a new rule set.
    ///
    /// On failure the previous rule set stays in place.
    pub async fn rebuild(&self, store: &dyn PermissionStore) -> Result<Arc<RuleSet>, PermissionError> {
        let snapshot = store.role_permissions().await?;
        let rules = Arc::new(RuleSet::build(&snapshot)?);
        *self.current.write().await = rules.clone();
        info!(rules = rules.len(), rows = snapshot.len(), "permission rules rebuilt");
        Ok(rules)
    }
}

//! Self-scope: resources a low-privilege caller may touch only under its own id.

use tracing::debug;

use super::AuthError;
use crate::models::auth::UserProfile;
use crate::permissions::PermissionError;
use crate::permissions::pattern::{PathPattern, normalize_path};

/// Placeholder replaced by the caller's own id.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Default roles subject to the self-scope check.
pub const DEFAULT_SELF_SCOPE_ROLES: [&str; 2] = ["USER", "NEW_USER"];

/// Default "create/touch own resource" paths guarded for self-scope roles.
pub const DEFAULT_GUARDED_PATHS: [&str; 4] = [
    "/api/users",
    "/api/persons",
    "/api/users/{id}",
    "/api/persons/{id}",
];

/// Resolve the self-scoped URL list embedded in a session token.
///
/// Callers without a self-scope role get `resources` unchanged. For the
/// others, `{id}` is replaced by the user id in user resources and by the
/// owned person id in person resources; a resource that cannot be resolved
/// is dropped.
pub fn materialize_self_scoped_urls<S: AsRef<str>>(
    resources: &[String],
    roles: &[String],
    self_scope_roles: &[S],
    profile: &UserProfile,
) -> Vec<String> {
    let scoped = self_scope_roles
        .iter()
        .any(|wanted| roles.iter().any(|r| r == wanted.as_ref()));
    if !scoped {
        return resources.to_vec();
    }
    resources
        .iter()
        .filter_map(|url| {
            if url.contains(ID_PLACEHOLDER) {
                resolve_own_url(url, profile)
            } else {
                Some(url.clone())
            }
        })
        .collect()
}

fn resolve_own_url(url: &str, profile: &UserProfile) -> Option<String> {
    // Person resources take precedence: "/api/users/{id}/person" is a person.
    if url.contains("person") {
        return profile
            .owned_person_id
            .map(|id| url.replace(ID_PLACEHOLDER, &id.to_string()));
    }
    if url.contains("user") {
        return Some(url.replace(ID_PLACEHOLDER, &profile.user_id.to_string()));
    }
    None
}

/// Per-request self-scope check for designated low-privilege roles.
///
/// Placeholders in guarded paths only match numeric ids, so
/// `/api/users/me` is not guarded by `/api/users/{id}`.
#[derive(Debug, Clone)]
pub struct SelfScopePolicy {
    roles: Vec<String>,
    guarded: Vec<PathPattern>,
}

impl SelfScopePolicy {
    pub fn new<S: AsRef<str>>(roles: &[S], guarded_paths: &[S]) -> Result<Self, PermissionError> {
        let guarded = guarded_paths
            .iter()
            .map(|p| PathPattern::parse(p.as_ref()).map(PathPattern::with_numeric_placeholders))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            roles: roles.iter().map(|r| r.as_ref().to_string()).collect(),
            guarded,
        })
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_guarded(&self, path: &str) -> bool {
        self.guarded.iter().any(|p| p.matches(path))
    }

    /// A caller holding a self-scope role may reach a guarded path only when
    /// the path is one of its embedded self-scoped URLs.
    pub fn check(
        &self,
        path: &str,
        roles: &[String],
        self_scoped_urls: &[String],
    ) -> Result<(), AuthError> {
        let scoped = roles.iter().any(|r| self.roles.contains(r));
        if !scoped || !self.is_guarded(path) {
            return Ok(());
        }
        let wanted = normalize_path(path);
        if self_scoped_urls.iter().any(|u| normalize_path(u) == wanted) {
            Ok(())
        } else {
            debug!(path = %wanted, "path outside the caller's self scope");
            Err(AuthError::ForbiddenSelfScope)
        }
    }
}

impl Default for SelfScopePolicy {
    fn default() -> Self {
        Self {
            roles: DEFAULT_SELF_SCOPE_ROLES.iter().map(|r| r.to_string()).collect(),
            guarded: DEFAULT_GUARDED_PATHS
                .iter()
                .filter_map(|p| PathPattern::parse(p).ok())
                .map(PathPattern::with_numeric_placeholders)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserState;

    fn profile(person: Option<i64>) -> UserProfile {
        UserProfile {
            user_id: 42,
            user_state: UserState::Active,
            email: "alice@x.com".into(),
            owned_person_id: person,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn materializes_user_and_person_ids() {
        let resources = strings(&[
            "/api/users/{id}",
            "/api/persons/{id}",
            "/api/persons",
            "/api/reports/{id}",
        ]);
        let urls = materialize_self_scoped_urls(
            &resources,
            &strings(&["USER"]),
            &DEFAULT_SELF_SCOPE_ROLES[..],
            &profile(Some(7)),
        );
        assert_eq!(urls, strings(&["/api/users/42", "/api/persons/7", "/api/persons"]));
    }

    #[test]
    fn missing_person_drops_person_urls() {
        let urls = materialize_self_scoped_urls(
            &strings(&["/api/users/{id}", "/api/persons/{id}"]),
            &strings(&["NEW_USER"]),
            &DEFAULT_SELF_SCOPE_ROLES[..],
            &profile(None),
        );
        assert_eq!(urls, strings(&["/api/users/42"]));
    }

    #[test]
    fn other_roles_keep_resources_verbatim() {
        let resources = strings(&["/api/users/{id}"]);
        let urls = materialize_self_scoped_urls(
            &resources,
            &strings(&["ADMIN"]),
            &DEFAULT_SELF_SCOPE_ROLES[..],
            &profile(None),
        );
        assert_eq!(urls, resources);
    }

    #[test]
    fn own_id_allowed_foreign_id_denied() {
        let policy = SelfScopePolicy::default();
        let roles = strings(&["USER"]);
        let urls = strings(&["/api/users/42", "/api/persons"]);

        assert!(policy.check("/api/users/42", &roles, &urls).is_ok());
        assert!(matches!(
            policy.check("/api/users/43", &roles, &urls),
            Err(AuthError::ForbiddenSelfScope)
        ));
        assert!(policy.check("/api/persons", &roles, &urls).is_ok());
        assert!(policy.check("/api/persons/", &roles, &urls).is_ok());
    }

    #[test]
    fn guarded_path_without_grant_is_denied() {
        let policy = SelfScopePolicy::default();
        let roles = strings(&["USER"]);
        let urls = strings(&["/api/users/42"]);
        assert!(policy.check("/api/persons", &roles, &urls).is_err());
        assert!(policy.check("/api/persons//", &roles, &urls).is_err());
    }

    #[test]
    fn unguarded_paths_and_other_roles_pass() {
        let policy = SelfScopePolicy::default();
        assert!(policy
            .check("/api/reports", &strings(&["USER"]), &[])
            .is_ok());
        assert!(policy
            .check("/api/users/43", &strings(&["ADMIN"]), &[])
            .is_ok());
        assert!(policy
            .check("/api/users/me", &strings(&["USER"]), &[])
            .is_ok());
    }
}

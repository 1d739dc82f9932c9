//! Permission-rule administration.

use axum::Json;
use axum::extract::State;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::RulesRebuildResponse;

/// `POST /api/permissions/rules/rebuild`
///
/// Re-read role/permission assignments and swap in the new rule set.
/// Rule-admin roles only.
pub async fn rebuild_rules_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<RulesRebuildResponse>> {
    if !user.principal.has_any_role(&state.config.rule_admin_roles) {
        return Err(AppError::Forbidden(
            ErrorCode::UriForbidden,
            "Rule rebuild requires an administrator role".into(),
        ));
    }
    let rules = state.rules.rebuild(state.permissions.as_ref()).await?;
    info!(subject = %user.principal.username, rules = rules.len(), "permission rules rebuilt on request");
    Ok(Json(RulesRebuildResponse { rules: rules.len() }))
}

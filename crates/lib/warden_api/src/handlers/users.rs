//! Current-principal handler.

use axum::Json;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::PrincipalResponse;

/// `GET /api/users/me`
///
/// The principal bound by the filter chain.
pub async fn me_handler(user: AuthenticatedUser) -> Json<PrincipalResponse> {
    let claims = user.claims;
    Json(PrincipalResponse {
        username: user.principal.username,
        roles: user.principal.roles,
        user_id: claims.user_id,
        user_state: claims.user_state.to_string(),
        email: claims.email,
        self_scoped_urls: claims.self_scoped_urls,
    })
}

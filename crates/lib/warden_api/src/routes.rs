//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const DELETE_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_REFRESH_JWT: &str = "/api/auth/refresh-jwt";
pub const GET_AUTH_CSRF: &str = "/api/auth/csrf";
pub const GET_VERIFICATION_CSRF: &str = "/api/verification/csrf";
pub const GET_USERS_ME: &str = "/api/users/me";
pub const POST_PERMISSIONS_RULES_REBUILD: &str = "/api/permissions/rules/rebuild";
pub const GET_ACTUATOR_HEALTH: &str = "/actuator/health";

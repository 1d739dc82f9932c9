//! Request handlers.

pub mod auth;
pub mod health;
pub mod permissions;
pub mod users;

use crate::error::{AppError, ErrorCode};

/// Fallback for unrouted paths. Only reached once the filter chain allowed
/// the request.
pub async fn not_found_handler() -> AppError {
    AppError::NotFound(ErrorCode::NotFound, "No such resource".into())
}

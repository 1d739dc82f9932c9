//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::error;
use warden_core::auth::AuthError;
use warden_core::csrf::CsrfError;
use warden_core::permissions::PermissionError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Stable error codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TokenInvalid,
    UriForbidden,
    BadCredentials,
    TokenExpired,
    TokenNotFound,
    CsrfEmailMismatch,
    CsrfCodeMismatch,
    CsrfNotFound,
    CsrfExpired,
    UserNotFound,
    NotFound,
    Validation,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TokenInvalid => "FUNC_SEC_AUTH_0001",
            ErrorCode::UriForbidden => "FUNC_SEC_AUTH_0002",
            ErrorCode::BadCredentials => "FUNC_SEC_AUTH_0003",
            ErrorCode::TokenExpired => "FUNC_SEC_AUTH_0004",
            ErrorCode::TokenNotFound => "FUNC_SEC_AUTH_0005",
            ErrorCode::CsrfEmailMismatch => "FUNC_SEC_AUTH_0006",
            ErrorCode::CsrfCodeMismatch => "FUNC_SEC_AUTH_0008",
            ErrorCode::CsrfNotFound => "FUNC_SEC_CSRF_0001",
            ErrorCode::CsrfExpired => "FUNC_SEC_CSRF_0002",
            ErrorCode::UserNotFound => "FUNC_SEC_USER_0003",
            ErrorCode::NotFound => "FUNC_COMMON_0002",
            ErrorCode::Validation => "FUNC_COMMON_0001",
            ErrorCode::Internal => "TECH_COMMON_0001",
        }
    }
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {1}")]
    Unauthorized(ErrorCode, String),

    #[error("Forbidden: {1}")]
    Forbidden(ErrorCode, String),

    #[error("Not found: {1}")]
    NotFound(ErrorCode, String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(..) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::Validation,
            AppError::Unauthorized(code, _)
            | AppError::Forbidden(code, _)
            | AppError::NotFound(code, _) => *code,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Validation(m)
            | AppError::Unauthorized(_, m)
            | AppError::Forbidden(_, m)
            | AppError::NotFound(_, m) => m.clone(),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                "Internal server error".to_string()
            }
        };
        let body = Json(ErrorResponse {
            id: None,
            code: self.code().as_str().to_string(),
            message,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        (self.status(), body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::TokenNotFound => AppError::Unauthorized(ErrorCode::TokenNotFound, message),
            AuthError::TokenExpired => AppError::Unauthorized(ErrorCode::TokenExpired, message),
            AuthError::TokenMalformed(_)
            | AuthError::SignatureInvalid
            | AuthError::SubjectMismatch => {
                AppError::Unauthorized(ErrorCode::TokenInvalid, message)
            }
            AuthError::ForbiddenSelfScope => AppError::Forbidden(ErrorCode::UriForbidden, message),
            AuthError::CredentialError => {
                AppError::Unauthorized(ErrorCode::BadCredentials, message)
            }
            AuthError::UserNotFound(_) => AppError::NotFound(ErrorCode::UserNotFound, message),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CsrfError> for AppError {
    fn from(e: CsrfError) -> Self {
        let message = e.to_string();
        match e {
            CsrfError::NotFound => AppError::Forbidden(ErrorCode::CsrfNotFound, message),
            CsrfError::EmailMismatch => AppError::Forbidden(ErrorCode::CsrfEmailMismatch, message),
            CsrfError::CodeMismatch => AppError::Forbidden(ErrorCode::CsrfCodeMismatch, message),
            CsrfError::Expired => AppError::Forbidden(ErrorCode::CsrfExpired, message),
            CsrfError::DbError(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<PermissionError> for AppError {
    fn from(e: PermissionError) -> Self {
        AppError::Internal(e.to_string())
    }
}

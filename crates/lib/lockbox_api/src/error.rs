//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lockbox_core::auth::AuthError;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// `code` values are the stable error kinds clients match on.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Unauthenticated { code: &'static str, message: String },

    #[error("Unauthorized: {0}")]
    Forbidden(String),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    fn unauthenticated(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthenticated {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut correlation_id = None;
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            AppError::Unauthenticated { code, message } => {
                (StatusCode::UNAUTHORIZED, *code, message.clone())
            }
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "unauthorized", m.clone()),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone()),
            AppError::Internal(detail) => {
                let id = Uuid::new_v4().to_string();
                error!(correlation_id = %id, error = %detail, "internal error");
                correlation_id = Some(id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            correlation_id,
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                AppError::unauthenticated("invalid_credentials", "Invalid credentials")
            }
            AuthError::InvalidToken(reason) => {
                AppError::unauthenticated("invalid_token", format!("Invalid token: {reason}"))
            }
            AuthError::ExpiredToken => AppError::unauthenticated("expired_token", "Token expired"),
            AuthError::RefreshTokenNotFound => AppError::unauthenticated(
                "refresh_token_not_found",
                "Refresh token not found or expired",
            ),
            e @ AuthError::KeyAlreadyProvisioned(_) => AppError::Conflict {
                code: "key_already_provisioned",
                message: e.to_string(),
            },
            e @ AuthError::KeyNotProvisioned(_) => AppError::Conflict {
                code: "key_not_provisioned",
                message: e.to_string(),
            },
            e @ AuthError::IdentityNotFound(_) => AppError::NotFound(e.to_string()),
            AuthError::Unauthorized(msg) => AppError::Forbidden(msg),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            // Caller-supplied ciphertext that does not open.
            AuthError::Encryption(_) => {
                AppError::Validation("Ciphertext could not be opened".into())
            }
            e @ (AuthError::CorruptRecord(_)
            | AuthError::DbError(_)
            | AuthError::Io(_)
            | AuthError::Internal(_)) => AppError::Internal(e.to_string()),
        }
    }
}

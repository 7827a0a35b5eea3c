//! Authentication and authorization logic.
//!
//! Password hashing, access and refresh tokens, the self-or-admin policy,
//! and the session flows composed from them.

pub mod email_index;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod queries;
pub mod refresh;
pub mod session;

use thiserror::Error;

use crate::ids::IdentityId;

/// Authentication errors.
///
/// Messages never carry keys, salts or raw token values.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown identity. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Refresh token not found or expired")]
    RefreshTokenNotFound,

    #[error("Envelope key already provisioned for identity {0}")]
    KeyAlreadyProvisioned(IdentityId),

    #[error("No envelope key provisioned for identity {0}")]
    KeyNotProvisioned(IdentityId),

    #[error("Identity {0} not found")]
    IdentityNotFound(IdentityId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

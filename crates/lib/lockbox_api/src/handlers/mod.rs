//! Request handlers.

pub mod auth;
pub mod identities;
pub mod internal;

use lockbox_core::ids::IdentityId;

use crate::error::AppError;

/// Parse an `{id}` path segment.
pub(crate) fn parse_identity_id(raw: &str) -> Result<IdentityId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid identity id: {raw}")))
}

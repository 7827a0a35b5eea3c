//! Blind index over email addresses.
//!
//! Identity records keep the address sealed under the owner's envelope key,
//! which cannot be searched. Lookups and the uniqueness constraint instead
//! use HMAC-SHA256 of the normalized address under a server-wide secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Keyed digest of normalized email addresses.
#[derive(Clone)]
pub struct EmailIndex {
    secret: Vec<u8>,
}

impl EmailIndex {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex digest of `email`. Addresses that differ only in case or
    /// surrounding whitespace share a digest.
    pub fn digest(&self, email: &str) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("email index key: {e}")))?;
        mac.update(normalize_email(email).as_bytes());
        Ok(format!("{:x}", mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for EmailIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailIndex")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Emails compare case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

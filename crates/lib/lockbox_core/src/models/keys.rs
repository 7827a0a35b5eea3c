//! Envelope key and sealed-field models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::IdentityId;

/// AES-256 key size (32 bytes).
pub const KEY_SIZE: usize = 32;
/// GCM-SIV nonce size, used as the per-identity IV (12 bytes).
pub const IV_SIZE: usize = 12;

/// Per-identity symmetric key and IV. Created once at registration and never
/// changed.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopeKey {
    pub identity_id: IdentityId,
    pub key: [u8; KEY_SIZE],
    pub iv: [u8; IV_SIZE],
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKey")
            .field("identity_id", &self.identity_id)
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

/// Base64 ciphertext of a sensitive field, sealed under one identity's
/// envelope key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretField(pub String);

impl SecretField {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

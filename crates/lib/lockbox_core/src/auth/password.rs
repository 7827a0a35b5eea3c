//! Salted SHA-256 password hashing.
//!
//! A password blob is `salt ‖ SHA-256(salt ‖ plaintext)`. The salt length N
//! is fixed by configuration; a blob that does not split into exactly N salt
//! bytes and one digest was written under a different N (or is damaged) and
//! is rejected as corrupt rather than truncated.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::AuthError;

/// Default salt length in bytes.
pub const DEFAULT_SALT_LEN: usize = 32;

/// SHA-256 digest length.
const DIGEST_LEN: usize = 32;

/// Hashes and verifies password blobs with a fixed salt length.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    salt_len: usize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_SALT_LEN)
    }
}

impl PasswordHasher {
    pub fn new(salt_len: usize) -> Self {
        Self { salt_len }
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Hash a password under a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Vec<u8> {
        let mut salt = vec![0u8; self.salt_len];
        rand::rng().fill_bytes(&mut salt);

        let digest = digest(&salt, plaintext);
        let mut blob = salt;
        blob.extend_from_slice(&digest);
        blob
    }

    /// Verify a password against a stored blob in constant time.
    pub fn verify(&self, plaintext: &str, blob: &[u8]) -> Result<bool, AuthError> {
        if blob.len() < self.salt_len {
            return Err(AuthError::CorruptRecord(format!(
                "password blob is {} bytes, shorter than the {}-byte salt",
                blob.len(),
                self.salt_len
            )));
        }
        if blob.len() != self.salt_len + DIGEST_LEN {
            return Err(AuthError::CorruptRecord(format!(
                "password blob is {} bytes, expected {}",
                blob.len(),
                self.salt_len + DIGEST_LEN
            )));
        }

        let (salt, expected) = blob.split_at(self.salt_len);
        let actual = digest(salt, plaintext);
        Ok(actual.as_slice().ct_eq(expected).into())
    }
}

fn digest(salt: &[u8], plaintext: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plaintext.as_bytes());
    hasher.finalize().into()
}

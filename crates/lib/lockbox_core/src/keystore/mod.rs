//! Per-identity envelope keys for sensitive fields.
//!
//! Each identity gets exactly one AES-256 key and IV, created at
//! registration and kept by an injected [`KeyCustody`]. The [`Keystore`] is
//! the authority on whether an identity is provisioned: sealing or opening a
//! field for an unprovisioned identity fails with `KeyNotProvisioned`.
//!
//! Losing a custody record makes every field sealed for that identity
//! unrecoverable. See [`cipher`] for the fixed-IV trade-off.

pub mod cipher;
pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::auth::AuthError;
use crate::ids::IdentityId;
use crate::models::keys::{EnvelopeKey, SecretField};

/// Durable custody of envelope keys, keyed by identity.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    async fn get(&self, identity_id: IdentityId) -> Result<Option<EnvelopeKey>, AuthError>;

    /// Record `key`. Fails with `KeyAlreadyProvisioned` if the identity
    /// already has one; the check and the write are atomic.
    async fn create(&self, key: &EnvelopeKey) -> Result<(), AuthError>;
}

/// Envelope key lifecycle and field encryption.
#[derive(Clone)]
pub struct Keystore {
    custody: Arc<dyn KeyCustody>,
}

impl Keystore {
    pub fn new(custody: Arc<dyn KeyCustody>) -> Self {
        Self { custody }
    }

    /// Generate and record the identity's key and IV.
    pub async fn create(&self, identity_id: IdentityId) -> Result<EnvelopeKey, AuthError> {
        let key = EnvelopeKey {
            identity_id,
            key: cipher::generate_key(),
            iv: cipher::generate_iv(),
        };
        self.custody.create(&key).await?;
        info!(identity_id = %identity_id, "envelope key provisioned");
        Ok(key)
    }

    pub async fn lookup(&self, identity_id: IdentityId) -> Result<Option<EnvelopeKey>, AuthError> {
        self.custody.get(identity_id).await
    }

    async fn require(&self, identity_id: IdentityId) -> Result<EnvelopeKey, AuthError> {
        self.lookup(identity_id)
            .await?
            .ok_or(AuthError::KeyNotProvisioned(identity_id))
    }

    /// Encrypt a field value for `identity_id`.
    pub async fn seal(
        &self,
        identity_id: IdentityId,
        plaintext: &str,
    ) -> Result<SecretField, AuthError> {
        let key = self.require(identity_id).await?;
        let sealed = cipher::encrypt(plaintext.as_bytes(), &key.key, &key.iv)?;
        Ok(SecretField(STANDARD.encode(sealed)))
    }

    /// Decrypt a field value sealed for `identity_id`.
    pub async fn open(
        &self,
        identity_id: IdentityId,
        field: &SecretField,
    ) -> Result<String, AuthError> {
        let key = self.require(identity_id).await?;
        let sealed = STANDARD
            .decode(field.as_str())
            .map_err(|e| AuthError::Encryption(format!("Base64 decode failed: {e}")))?;
        let plaintext = cipher::decrypt(&sealed, &key.key, &key.iv)?;
        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Encryption(format!("UTF-8 decode failed: {e}")))
    }
}

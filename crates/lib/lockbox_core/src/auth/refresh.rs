//! Refresh tokens: issuance, validation and single-use rotation.
//!
//! Token values are 256 random bits, base64-encoded, and live for 24 hours.
//! Stores only ever see the SHA-256 digest of a value. Rotation consumes the
//! presented token with one conditional removal before the successor is
//! issued, so a given token rotates at most once even under concurrent
//! requests.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthError;
use crate::ids::IdentityId;
use crate::models::auth::{RefreshToken, RefreshTokenRecord};

/// Refresh token lifetime: 24 hours.
pub const REFRESH_TOKEN_EXPIRY_HOURS: i64 = 24;

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generate a cryptographically random, base64-encoded token value.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persistence of refresh token records.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store `record`, dropping records of the same identity that expired
    /// before `record.issued_at`.
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError>;

    /// Find the record for `identity_id` whose hash equals `token_hash` and
    /// which is live at `now`.
    async fn find_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Like [`Self::find_live`], but removes the record in the same atomic
    /// step. Of several concurrent callers at most one receives `Some`.
    async fn take_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Remove every record of `identity_id`, returning how many went.
    async fn remove_all(&self, identity_id: IdentityId) -> Result<u64, AuthError>;

    /// Remove every record that expired before `now`.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// In-memory refresh token store.
///
/// Records are grouped per identity; the map shard lock makes
/// `take_live` a compare-and-delete.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<IdentityId, Vec<RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(record: &RefreshTokenRecord, token_hash: &str, now: DateTime<Utc>) -> bool {
    let same: bool = record
        .token_hash
        .as_bytes()
        .ct_eq(token_hash.as_bytes())
        .into();
    same && record.is_live_at(now)
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError> {
        let mut records = self.tokens.entry(record.identity_id).or_default();
        records.retain(|r| r.is_live_at(record.issued_at));
        records.push(record);
        Ok(())
    }

    async fn find_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.tokens.get(&identity_id).and_then(|records| {
            records
                .iter()
                .find(|r| matches(r, token_hash, now))
                .cloned()
        }))
    }

    async fn take_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let Some(mut records) = self.tokens.get_mut(&identity_id) else {
            return Ok(None);
        };
        let position = records.iter().position(|r| matches(r, token_hash, now));
        Ok(position.map(|pos| records.swap_remove(pos)))
    }

    async fn remove_all(&self, identity_id: IdentityId) -> Result<u64, AuthError> {
        Ok(self
            .tokens
            .remove(&identity_id)
            .map(|(_, records)| records.len() as u64)
            .unwrap_or(0))
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut removed = 0u64;
        self.tokens.retain(|_, records| {
            let before = records.len();
            records.retain(|r| r.is_live_at(now));
            removed += (before - records.len()) as u64;
            !records.is_empty()
        });
        Ok(removed)
    }
}

/// Refresh token operations over an injected store.
#[derive(Clone)]
pub struct RefreshTokenService {
    store: Arc<dyn RefreshTokenStore>,
}

impl RefreshTokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { store }
    }

    /// Issue a new refresh token for `identity_id`. Existing tokens of that
    /// identity stay valid.
    pub async fn issue(&self, identity_id: IdentityId) -> Result<RefreshToken, AuthError> {
        self.issue_at(identity_id, Utc::now()).await
    }

    async fn issue_at(
        &self,
        identity_id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, AuthError> {
        let value = generate_token();
        let expires_at = now + Duration::hours(REFRESH_TOKEN_EXPIRY_HOURS);
        self.store
            .insert(RefreshTokenRecord {
                id: Uuid::now_v7(),
                identity_id,
                token_hash: hash_token(&value),
                issued_at: now,
                expires_at,
            })
            .await?;
        debug!(identity_id = %identity_id, %expires_at, "refresh token issued");
        Ok(RefreshToken { value, expires_at })
    }

    /// True iff `presented` is a live token of `identity_id`.
    pub async fn validate(
        &self,
        identity_id: IdentityId,
        presented: &str,
    ) -> Result<bool, AuthError> {
        let found = self
            .store
            .find_live(identity_id, &hash_token(presented), Utc::now())
            .await?;
        Ok(found.is_some())
    }

    /// Consume `presented` and issue its successor.
    ///
    /// Fails with `RefreshTokenNotFound`, issuing nothing, if the token is
    /// unknown, expired, belongs to another identity, or was already used.
    pub async fn rotate(
        &self,
        identity_id: IdentityId,
        presented: &str,
    ) -> Result<RefreshToken, AuthError> {
        let now = Utc::now();
        let consumed = self
            .store
            .take_live(identity_id, &hash_token(presented), now)
            .await?;
        if consumed.is_none() {
            debug!(identity_id = %identity_id, "refresh token rejected");
            return Err(AuthError::RefreshTokenNotFound);
        }
        self.issue_at(identity_id, now).await
    }

    /// Revoke one token. Returns whether it was live.
    pub async fn revoke(
        &self,
        identity_id: IdentityId,
        presented: &str,
    ) -> Result<bool, AuthError> {
        let taken = self
            .store
            .take_live(identity_id, &hash_token(presented), Utc::now())
            .await?;
        Ok(taken.is_some())
    }

    /// Revoke every token of an identity.
    pub async fn revoke_all(&self, identity_id: IdentityId) -> Result<u64, AuthError> {
        let removed = self.store.remove_all(identity_id).await?;
        info!(identity_id = %identity_id, removed, "revoked all refresh tokens");
        Ok(removed)
    }

    /// Drop expired records.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        self.store.remove_expired(Utc::now()).await
    }
}

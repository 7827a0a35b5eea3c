//! Postgres-backed identity and refresh token stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::identity::IdentityRepository;
use super::refresh::RefreshTokenStore;
use crate::ids::IdentityId;
use crate::models::auth::{IdentityRecord, RefreshTokenRecord};
use crate::models::keys::SecretField;

type IdentityRow = (Uuid, String, String, String, Vec<u8>, bool, DateTime<Utc>);
type RefreshRow = (Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>);

fn identity_from_row(row: IdentityRow) -> IdentityRecord {
    let (id, email_index, email, role, password_blob, verified, created_at) = row;
    IdentityRecord {
        id: IdentityId::from(id),
        email_index,
        email: SecretField(email),
        role: SecretField(role),
        password_blob,
        verified,
        created_at,
    }
}

fn record_from_row(row: RefreshRow) -> RefreshTokenRecord {
    let (id, identity_id, token_hash, issued_at, expires_at) = row;
    RefreshTokenRecord {
        id,
        identity_id: IdentityId::from(identity_id),
        token_hash,
        issued_at,
        expires_at,
    }
}

/// Identity repository over the `identities` table.
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<IdentityRecord>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email_index, email_sealed, role_sealed, password_blob, verified, \
             created_at FROM identities WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(identity_from_row))
    }

    async fn find_by_email_index(
        &self,
        email_index: &str,
    ) -> Result<Option<IdentityRecord>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email_index, email_sealed, role_sealed, password_blob, verified, \
             created_at FROM identities WHERE email_index = $1",
        )
        .bind(email_index)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(identity_from_row))
    }

    async fn insert(&self, record: &IdentityRecord) -> Result<(), AuthError> {
        let result = sqlx::query(
            "INSERT INTO identities \
             (id, email_index, email_sealed, role_sealed, password_blob, verified, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id.as_uuid())
        .bind(&record.email_index)
        .bind(record.email.as_str())
        .bind(record.role.as_str())
        .bind(&record.password_blob)
        .bind(record.verified)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AuthError::ValidationError("Email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, record: &IdentityRecord) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE identities \
             SET email_index = $2, email_sealed = $3, role_sealed = $4, \
                 password_blob = $5, verified = $6 \
             WHERE id = $1",
        )
        .bind(record.id.as_uuid())
        .bind(&record.email_index)
        .bind(record.email.as_str())
        .bind(record.role.as_str())
        .bind(&record.password_blob)
        .bind(record.verified)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Refresh tokens go with the identity via ON DELETE CASCADE.
    async fn delete(&self, id: IdentityId) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, AuthError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

/// Refresh token store over the `refresh_tokens` table.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE identity_id = $1 AND expires_at < $2")
            .bind(record.identity_id.as_uuid())
            .bind(record.issued_at)
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO refresh_tokens (id, identity_id, token_hash, issued_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.identity_id.as_uuid())
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RefreshRow>(
            "SELECT id, identity_id, token_hash, issued_at, expires_at \
             FROM refresh_tokens \
             WHERE identity_id = $1 AND token_hash = $2 AND expires_at >= $3 \
             LIMIT 1",
        )
        .bind(identity_id.as_uuid())
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(record_from_row))
    }

    // A single DELETE … RETURNING: concurrent callers race on the row lock and
    // only one of them gets it back.
    async fn take_live(
        &self,
        identity_id: IdentityId,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RefreshRow>(
            "DELETE FROM refresh_tokens \
             WHERE identity_id = $1 AND token_hash = $2 AND expires_at >= $3 \
             RETURNING id, identity_id, token_hash, issued_at, expires_at",
        )
        .bind(identity_id.as_uuid())
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(record_from_row))
    }

    async fn remove_all(&self, identity_id: IdentityId) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE identity_id = $1")
            .bind(identity_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Identity repository seam.
//!
//! The credential core never decides how identities are stored; it talks to
//! an [`IdentityRepository`]. [`MemoryIdentityRepository`] backs tests and
//! ephemeral servers, `queries::PgIdentityRepository` backs production.
//! Repositories only ever see [`IdentityRecord`]s, whose email and role are
//! already sealed.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AuthError;
use crate::ids::IdentityId;
use crate::models::auth::IdentityRecord;

/// Storage of identity records.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<IdentityRecord>, AuthError>;

    /// Find the record whose blind email index equals `email_index`.
    async fn find_by_email_index(
        &self,
        email_index: &str,
    ) -> Result<Option<IdentityRecord>, AuthError>;

    /// Insert a new record. Fails with `ValidationError` if its email index
    /// is already taken.
    async fn insert(&self, record: &IdentityRecord) -> Result<(), AuthError>;

    /// Replace an existing record. Returns false if it does not exist.
    async fn update(&self, record: &IdentityRecord) -> Result<bool, AuthError>;

    /// Delete a record. Returns false if it did not exist.
    async fn delete(&self, id: IdentityId) -> Result<bool, AuthError>;

    async fn count(&self) -> Result<u64, AuthError>;
}

/// In-memory identity repository.
#[derive(Debug, Default)]
pub struct MemoryIdentityRepository {
    records: RwLock<HashMap<IdentityId, IdentityRecord>>,
}

impl MemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, in no particular order.
    pub async fn records(&self) -> Vec<IdentityRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl IdentityRepository for MemoryIdentityRepository {
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<IdentityRecord>, AuthError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_email_index(
        &self,
        email_index: &str,
    ) -> Result<Option<IdentityRecord>, AuthError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.email_index == email_index)
            .cloned())
    }

    async fn insert(&self, record: &IdentityRecord) -> Result<(), AuthError> {
        let mut records = self.records.write().await;
        if records.values().any(|r| r.email_index == record.email_index) {
            return Err(AuthError::ValidationError("Email already registered".into()));
        }
        if records.contains_key(&record.id) {
            return Err(AuthError::Internal(format!(
                "identity {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &IdentityRecord) -> Result<bool, AuthError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: IdentityId) -> Result<bool, AuthError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        Ok(self.records.read().await.len() as u64)
    }
}

//! In-memory key custody.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::KeyCustody;
use crate::auth::AuthError;
use crate::ids::IdentityId;
use crate::models::keys::EnvelopeKey;

/// Key custody held in a concurrent map. Creation goes through the map's
/// entry API, so the existence check and the insert are one step.
#[derive(Debug, Default)]
pub struct MemoryKeyCustody {
    keys: DashMap<IdentityId, EnvelopeKey>,
}

impl MemoryKeyCustody {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyCustody for MemoryKeyCustody {
    async fn get(&self, identity_id: IdentityId) -> Result<Option<EnvelopeKey>, AuthError> {
        Ok(self.keys.get(&identity_id).map(|k| k.value().clone()))
    }

    async fn create(&self, key: &EnvelopeKey) -> Result<(), AuthError> {
        match self.keys.entry(key.identity_id) {
            Entry::Occupied(_) => Err(AuthError::KeyAlreadyProvisioned(key.identity_id)),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(())
            }
        }
    }
}

//! Self-or-admin authorization.
//!
//! An operation on a resource is permitted when the caller owns the resource
//! or holds the admin role. Ownership is resolved through an
//! [`OwnershipResolver`] so each resource kind can plug in its own lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::AuthError;
use super::identity::IdentityRepository;
use crate::ids::IdentityId;
use crate::models::auth::{Role, VerifiedToken};

/// Resolves the owning identity of a resource.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// `None` when the resource does not exist.
    async fn owner_of(&self, resource_id: &str) -> Result<Option<IdentityId>, AuthError>;
}

/// Ownership of identity resources: an identity owns itself.
pub struct IdentityOwnership {
    identities: Arc<dyn IdentityRepository>,
}

impl IdentityOwnership {
    pub fn new(identities: Arc<dyn IdentityRepository>) -> Self {
        Self { identities }
    }
}

#[async_trait]
impl OwnershipResolver for IdentityOwnership {
    async fn owner_of(&self, resource_id: &str) -> Result<Option<IdentityId>, AuthError> {
        let Ok(id) = resource_id.parse::<IdentityId>() else {
            return Ok(None);
        };
        Ok(self.identities.find_by_id(id).await?.map(|identity| identity.id))
    }
}

/// Evaluates the self-or-admin rule.
#[derive(Clone)]
pub struct AuthorizationPolicy {
    resolver: Arc<dyn OwnershipResolver>,
}

impl AuthorizationPolicy {
    pub fn new(resolver: Arc<dyn OwnershipResolver>) -> Self {
        Self { resolver }
    }

    pub fn is_admin(caller: &VerifiedToken) -> bool {
        caller.role() == Role::Admin
    }

    /// Whether the caller owns `resource_id`. Unknown resources are owned by
    /// nobody.
    pub async fn is_self(
        &self,
        caller: &VerifiedToken,
        resource_id: &str,
    ) -> Result<bool, AuthError> {
        let owner = self.resolver.owner_of(resource_id).await?;
        Ok(owner == Some(caller.identity_id()))
    }

    pub async fn is_authorized(
        &self,
        caller: &VerifiedToken,
        resource_id: &str,
    ) -> Result<bool, AuthError> {
        if self.is_self(caller, resource_id).await? {
            return Ok(true);
        }
        Ok(Self::is_admin(caller))
    }

    /// [`Self::is_authorized`] as a guard: `Unauthorized` on false.
    pub async fn authorize(
        &self,
        caller: &VerifiedToken,
        resource_id: &str,
    ) -> Result<(), AuthError> {
        if self.is_authorized(caller, resource_id).await? {
            return Ok(());
        }
        debug!(
            caller = %caller.identity_id(),
            resource_id,
            "authorization denied"
        );
        Err(AuthError::Unauthorized(
            "caller neither owns the resource nor is an admin".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::auth::identity::MemoryIdentityRepository;
    use crate::models::auth::{IdentityRecord, TokenClaims, TokenDomain};
    use crate::models::keys::SecretField;

    struct MapResolver(HashMap<String, IdentityId>);

    #[async_trait]
    impl OwnershipResolver for MapResolver {
        async fn owner_of(&self, resource_id: &str) -> Result<Option<IdentityId>, AuthError> {
            Ok(self.0.get(resource_id).copied())
        }
    }

    fn token(id: IdentityId, role: Role) -> VerifiedToken {
        VerifiedToken {
            domain: TokenDomain::User,
            claims: TokenClaims {
                sub: id,
                role,
                purpose: "access_token".into(),
                iss: "lockbox".into(),
                aud: "lockbox-clients".into(),
                iat: 0,
                exp: 0,
            },
        }
    }

    fn policy(owner: IdentityId) -> AuthorizationPolicy {
        let mut owners = HashMap::new();
        owners.insert("folder-1".to_string(), owner);
        AuthorizationPolicy::new(Arc::new(MapResolver(owners)))
    }

    #[tokio::test]
    async fn owner_is_authorized() {
        let a = IdentityId::new();
        let policy = policy(a);
        assert!(policy.is_self(&token(a, Role::User), "folder-1").await.unwrap());
        policy.authorize(&token(a, Role::User), "folder-1").await.unwrap();
    }

    #[tokio::test]
    async fn non_owner_user_is_rejected() {
        let a = IdentityId::new();
        let b = IdentityId::new();
        let err = policy(b)
            .authorize(&token(a, Role::User), "folder-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn admin_is_authorized_for_foreign_resource() {
        let a = IdentityId::new();
        let b = IdentityId::new();
        let policy = policy(b);
        let admin = token(a, Role::Admin);
        assert!(AuthorizationPolicy::is_admin(&admin));
        assert!(!policy.is_self(&admin, "folder-1").await.unwrap());
        policy.authorize(&admin, "folder-1").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_resource_is_owned_by_nobody() {
        let a = IdentityId::new();
        let policy = policy(a);
        assert!(!policy.is_self(&token(a, Role::User), "missing").await.unwrap());
        assert!(policy.authorize(&token(a, Role::User), "missing").await.is_err());
    }

    #[tokio::test]
    async fn identities_own_themselves() {
        let repo = Arc::new(MemoryIdentityRepository::new());
        let identity = IdentityRecord {
            id: IdentityId::new(),
            email_index: "idx-self".into(),
            email: SecretField("c2VsZg==".into()),
            role: SecretField("dXNlcg==".into()),
            password_blob: vec![],
            verified: true,
            created_at: Utc::now(),
        };
        repo.insert(&identity).await.unwrap();
        let resolver = IdentityOwnership::new(repo);

        assert_eq!(
            resolver.owner_of(&identity.id.to_string()).await.unwrap(),
            Some(identity.id)
        );
        assert_eq!(resolver.owner_of("not-a-uuid").await.unwrap(), None);
        assert_eq!(
            resolver.owner_of(&IdentityId::new().to_string()).await.unwrap(),
            None
        );
    }
}

//! Session flows: register, login, refresh, logout, and the identity-scoped
//! operations guarded by the self-or-admin policy.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::AuthError;
use super::email_index::EmailIndex;
use super::identity::IdentityRepository;
use super::jwt::{ACCESS_TOKEN_EXPIRY_SECS, AccessTokenService};
use super::password::PasswordHasher;
use super::policy::{AuthorizationPolicy, IdentityOwnership};
use super::refresh::{RefreshTokenService, RefreshTokenStore};
use crate::config::AuthConfig;
use crate::ids::IdentityId;
use crate::keystore::{KeyCustody, Keystore};
use crate::models::auth::{
    Identity, IdentityRecord, RefreshToken, Role, Session, VerifiedToken,
};
use crate::models::keys::SecretField;

/// Longest accepted email address.
const MAX_EMAIL_LEN: usize = 254;

/// Storage backends the session service runs on.
pub struct SessionStores {
    pub identities: Arc<dyn IdentityRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub key_custody: Arc<dyn KeyCustody>,
}

/// Composes hashing, token services, keystore and policy into the
/// credential flows.
pub struct SessionService {
    identities: Arc<dyn IdentityRepository>,
    email_index: EmailIndex,
    hasher: PasswordHasher,
    user_tokens: AccessTokenService,
    api_tokens: AccessTokenService,
    refresh: RefreshTokenService,
    keystore: Keystore,
    policy: AuthorizationPolicy,
    /// Verified against when the email is unknown, so that path costs the
    /// same as a wrong password.
    decoy_blob: Vec<u8>,
}

impl SessionService {
    pub fn new(config: &AuthConfig, stores: SessionStores) -> Self {
        let hasher = PasswordHasher::new(config.salt_len);
        Self {
            policy: AuthorizationPolicy::new(Arc::new(IdentityOwnership::new(
                stores.identities.clone(),
            ))),
            identities: stores.identities,
            email_index: EmailIndex::new(config.email_index_secret.as_bytes()),
            decoy_blob: hasher.hash("decoy"),
            hasher,
            user_tokens: AccessTokenService::user(config),
            api_tokens: AccessTokenService::api(config),
            refresh: RefreshTokenService::new(stores.refresh_tokens),
            keystore: Keystore::new(stores.key_custody),
        }
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenService {
        &self.refresh
    }

    /// Authenticate a user-domain bearer token.
    pub fn authenticate(&self, access_token: &str) -> Result<VerifiedToken, AuthError> {
        self.user_tokens.verify_unexpired(access_token)
    }

    /// Authenticate an API-domain bearer token.
    pub fn authenticate_api(&self, api_token: &str) -> Result<VerifiedToken, AuthError> {
        self.api_tokens.verify_unexpired(api_token)
    }

    /// Register a new identity. The first identity becomes an admin.
    pub async fn register(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;

        let email_index = self.email_index.digest(email)?;
        if self.identities.find_by_email_index(&email_index).await?.is_some() {
            return Err(AuthError::ValidationError("Email already registered".into()));
        }

        let role = if self.identities.count().await? == 0 {
            Role::Admin
        } else {
            Role::User
        };

        let identity = Identity {
            id: IdentityId::new(),
            email: email.to_string(),
            role,
            password_blob: self.hasher.hash(password),
            verified: false,
            created_at: Utc::now(),
        };
        // The key must exist before the record can be sealed. Should the
        // insert lose a race on the email index, the key stays behind
        // unreferenced; identity ids are never reused.
        self.keystore.create(identity.id).await?;
        let record = self.seal_identity(&identity, email_index).await?;
        if let Err(e) = self.identities.insert(&record).await {
            warn!(
                identity_id = %identity.id,
                error = %e,
                "identity insert failed after key provisioning"
            );
            return Err(e);
        }

        info!(identity_id = %identity.id, role = %role, "identity registered");
        self.start_session(&identity).await
    }

    /// Authenticate with email + password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email_index = self.email_index.digest(email)?;
        let Some(record) = self.identities.find_by_email_index(&email_index).await? else {
            let _ = self.hasher.verify(password, &self.decoy_blob);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &record.password_blob)? {
            info!(identity_id = %record.id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let identity = self.open_identity(record).await?;
        info!(identity_id = %identity.id, "login succeeded");
        self.start_session(&identity).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// `access_token` may be expired; only its identity is used. The
    /// presented refresh token is consumed.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        let identity_id = self.user_tokens.verify(access_token)?.identity_id();
        let next_refresh = self.refresh.rotate(identity_id, refresh_token).await?;

        let Some(record) = self.identities.find_by_id(identity_id).await? else {
            self.refresh.revoke_all(identity_id).await?;
            return Err(AuthError::InvalidCredentials);
        };
        let identity = self.open_identity(record).await?;

        let access_token = self.user_tokens.issue(identity.id, identity.role)?;
        info!(identity_id = %identity.id, "session refreshed");
        Ok(build_session(&identity, access_token, next_refresh))
    }

    /// Revoke one refresh token. `access_token` may be expired.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<bool, AuthError> {
        let identity_id = self.user_tokens.verify(access_token)?.identity_id();
        self.refresh.revoke(identity_id, refresh_token).await
    }

    /// Revoke every refresh token of the caller.
    pub async fn logout_all(&self, caller: &VerifiedToken) -> Result<u64, AuthError> {
        self.refresh.revoke_all(caller.identity_id()).await
    }

    /// Mint an API-domain token for the caller's identity.
    pub async fn issue_api_key(&self, caller: &VerifiedToken) -> Result<String, AuthError> {
        let identity = self.require_identity(caller.identity_id()).await?;
        let token = self.api_tokens.issue(identity.id, identity.role)?;
        info!(identity_id = %identity.id, "api key issued");
        Ok(token)
    }

    pub async fn get_identity(
        &self,
        caller: &VerifiedToken,
        target: IdentityId,
    ) -> Result<Identity, AuthError> {
        self.policy.authorize(caller, &target.to_string()).await?;
        self.require_identity(target).await
    }

    /// Replace the target's password under a fresh salt and end all of its
    /// sessions.
    pub async fn change_password(
        &self,
        caller: &VerifiedToken,
        target: IdentityId,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.policy.authorize(caller, &target.to_string()).await?;
        validate_password(new_password)?;

        let mut record = self.require_record(target).await?;
        record.password_blob = self.hasher.hash(new_password);
        if !self.identities.update(&record).await? {
            return Err(AuthError::IdentityNotFound(target));
        }
        self.refresh.revoke_all(target).await?;
        info!(identity_id = %target, changed_by = %caller.identity_id(), "password changed");
        Ok(())
    }

    /// Delete the target identity and its refresh tokens.
    pub async fn delete_identity(
        &self,
        caller: &VerifiedToken,
        target: IdentityId,
    ) -> Result<(), AuthError> {
        self.policy.authorize(caller, &target.to_string()).await?;
        self.refresh.revoke_all(target).await?;
        if !self.identities.delete(target).await? {
            return Err(AuthError::IdentityNotFound(target));
        }
        info!(identity_id = %target, deleted_by = %caller.identity_id(), "identity deleted");
        Ok(())
    }

    /// Seal a field value under the owner's envelope key.
    pub async fn seal_secret(
        &self,
        caller: &VerifiedToken,
        owner: IdentityId,
        plaintext: &str,
    ) -> Result<SecretField, AuthError> {
        self.policy.authorize(caller, &owner.to_string()).await?;
        self.keystore.seal(owner, plaintext).await
    }

    /// Open a field value sealed under the owner's envelope key.
    pub async fn open_secret(
        &self,
        caller: &VerifiedToken,
        owner: IdentityId,
        field: &SecretField,
    ) -> Result<String, AuthError> {
        self.policy.authorize(caller, &owner.to_string()).await?;
        self.keystore.open(owner, field).await
    }

    async fn require_record(&self, id: IdentityId) -> Result<IdentityRecord, AuthError> {
        self.identities
            .find_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound(id))
    }

    async fn require_identity(&self, id: IdentityId) -> Result<Identity, AuthError> {
        let record = self.require_record(id).await?;
        self.open_identity(record).await
    }

    async fn seal_identity(
        &self,
        identity: &Identity,
        email_index: String,
    ) -> Result<IdentityRecord, AuthError> {
        Ok(IdentityRecord {
            id: identity.id,
            email_index,
            email: self.keystore.seal(identity.id, &identity.email).await?,
            role: self.keystore.seal(identity.id, identity.role.as_str()).await?,
            password_blob: identity.password_blob.clone(),
            verified: identity.verified,
            created_at: identity.created_at,
        })
    }

    /// Decrypt a stored record. A record that does not open under its own
    /// key is corrupt, not a caller error.
    async fn open_identity(&self, record: IdentityRecord) -> Result<Identity, AuthError> {
        let id = record.id;
        let corrupt = |e: AuthError| match e {
            AuthError::Encryption(_) | AuthError::KeyNotProvisioned(_) => {
                AuthError::CorruptRecord(format!("identity {id}: {e}"))
            }
            other => other,
        };
        let email = self.keystore.open(id, &record.email).await.map_err(corrupt)?;
        let role = self
            .keystore
            .open(id, &record.role)
            .await
            .map_err(corrupt)?
            .parse::<Role>()
            .map_err(|e| AuthError::CorruptRecord(format!("identity {id}: {e}")))?;
        Ok(Identity {
            id,
            email,
            role,
            password_blob: record.password_blob,
            verified: record.verified,
            created_at: record.created_at,
        })
    }

    async fn start_session(&self, identity: &Identity) -> Result<Session, AuthError> {
        let access_token = self.user_tokens.issue(identity.id, identity.role)?;
        let refresh_token = self.refresh.issue(identity.id).await?;
        Ok(build_session(identity, access_token, refresh_token))
    }
}

fn build_session(
    identity: &Identity,
    access_token: String,
    refresh_token: RefreshToken,
) -> Session {
    Session {
        identity_id: identity.id,
        email: identity.email.clone(),
        role: identity.role,
        access_token,
        expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        refresh_token,
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let has_parts = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty()
    );
    let valid = email.len() <= MAX_EMAIL_LEN && has_parts;
    if !valid {
        return Err(AuthError::ValidationError("Invalid email address".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::ValidationError("Password must not be empty".into()));
    }
    Ok(())
}

//! Authentication domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::IdentityId;
use crate::models::keys::SecretField;

/// Fixed role enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A registered identity, including its password blob (`salt ‖ hash`).
#[derive(Clone)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub role: Role,
    pub password_blob: Vec<u8>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

// The password blob holds the salt; keep it and the email out of logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &"<redacted>")
            .field("role", &self.role)
            .field("password_blob", &"<redacted>")
            .field("verified", &self.verified)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// An identity as persisted.
///
/// Email and role are sealed under the identity's own envelope key. Lookup
/// by email goes through `email_index`, a keyed digest of the normalized
/// address, so the store never holds the address itself.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub email_index: String,
    pub email: SecretField,
    pub role: SecretField,
    pub password_blob: Vec<u8>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("email_index", &self.email_index)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_blob", &"<redacted>")
            .field("verified", &self.verified)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Trust domain of an access token.
///
/// User sessions and machine/API callers are signed with different secrets
/// and carry different purpose markers; a token from one domain never
/// satisfies the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenDomain {
    User,
    Api,
}

impl TokenDomain {
    /// Purpose marker carried in the `purpose` claim.
    pub fn purpose(&self) -> &'static str {
        match self {
            TokenDomain::User => "access_token",
            TokenDomain::Api => "api_key",
        }
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: identity ID.
    pub sub: IdentityId,
    pub role: Role,
    /// Purpose marker (see [`TokenDomain::purpose`]).
    pub purpose: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// An access token whose signature, algorithm, issuer, audience and purpose
/// have been checked for `domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub domain: TokenDomain,
    pub claims: TokenClaims,
}

impl VerifiedToken {
    pub fn identity_id(&self) -> IdentityId {
        self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    /// Whether `exp` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.claims.exp < now.timestamp()
    }
}

/// Refresh token record as persisted. Only the SHA-256 digest of the token
/// value is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub identity_id: IdentityId,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Live while `now <= expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// A freshly issued refresh token. The plaintext value exists only here and
/// in the response to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token pair handed back after register, login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity_id: IdentityId,
    pub email: String,
    pub role: Role,
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_token: RefreshToken,
}

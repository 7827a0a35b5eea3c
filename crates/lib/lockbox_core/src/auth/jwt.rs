//! JWT access token issuance and verification.
//!
//! One [`AccessTokenService`] exists per [`TokenDomain`]. Each is pinned to
//! HS256, its own secret, the configured issuer/audience, and its domain's
//! purpose marker, so a token minted for one domain never verifies in the
//! other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use super::AuthError;
use crate::config::AuthConfig;
use crate::ids::IdentityId;
use crate::models::auth::{Role, TokenClaims, TokenDomain, VerifiedToken};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// The only accepted signing algorithm.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Issues and verifies access tokens for a single trust domain.
#[derive(Clone)]
pub struct AccessTokenService {
    domain: TokenDomain,
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl AccessTokenService {
    pub fn new(domain: TokenDomain, secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self {
            domain,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// End-user session tokens.
    pub fn user(config: &AuthConfig) -> Self {
        Self::new(
            TokenDomain::User,
            config.user_token_secret.as_bytes(),
            &config.issuer,
            &config.audience,
        )
    }

    /// Machine/API tokens.
    pub fn api(config: &AuthConfig) -> Self {
        Self::new(
            TokenDomain::Api,
            config.api_token_secret.as_bytes(),
            &config.issuer,
            &config.audience,
        )
    }

    pub fn domain(&self) -> TokenDomain {
        self.domain
    }

    /// Issue a signed token for `identity_id` expiring in 15 minutes.
    pub fn issue(&self, identity_id: IdentityId, role: Role) -> Result<String, AuthError> {
        self.issue_at(identity_id, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        identity_id: IdentityId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: identity_id,
            role,
            purpose: self.domain.purpose().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, algorithm, issuer, audience and purpose.
    ///
    /// Expiry is NOT checked here: the refresh flow needs the identity of an
    /// expired token. Use [`Self::verify_unexpired`] for request
    /// authentication.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                ErrorKind::InvalidAlgorithm => "signing algorithm not allowed".to_string(),
                ErrorKind::InvalidIssuer => "issuer mismatch".to_string(),
                ErrorKind::InvalidAudience => "audience mismatch".to_string(),
                ErrorKind::MissingRequiredClaim(claim) => format!("missing claim '{claim}'"),
                _ => "malformed token".to_string(),
            };
            debug!(domain = ?self.domain, %reason, "access token rejected");
            AuthError::InvalidToken(reason)
        })?;

        if data.claims.purpose != self.domain.purpose() {
            debug!(domain = ?self.domain, "access token rejected: purpose mismatch");
            return Err(AuthError::InvalidToken("purpose mismatch".into()));
        }

        Ok(VerifiedToken {
            domain: self.domain,
            claims: data.claims,
        })
    }

    /// [`Self::verify`] plus an expiry check against the current time.
    pub fn verify_unexpired(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let verified = self.verify(token)?;
        if verified.is_expired_at(Utc::now()) {
            return Err(AuthError::ExpiredToken);
        }
        Ok(verified)
    }
}

//! Credential subsystem configuration.
//!
//! Signing secrets are injected at startup, never compiled in. Each trust
//! domain resolves its own secret: env var → persisted file → freshly
//! generated and persisted.

use std::path::PathBuf;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use crate::auth::AuthError;
use crate::auth::password::DEFAULT_SALT_LEN;

/// Default `iss` and `aud` claim value.
pub const DEFAULT_ISSUER: &str = "lockbox";
pub const DEFAULT_AUDIENCE: &str = "lockbox-clients";

/// Configuration for hashing, token signing and key custody.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 secret for end-user session tokens.
    pub user_token_secret: String,
    /// HS256 secret for machine/API tokens. Must differ from the user secret.
    pub api_token_secret: String,
    /// HMAC key of the blind email index. Changing it orphans every
    /// existing identity's lookup.
    pub email_index_secret: String,
    pub issuer: String,
    pub audience: String,
    /// Salt length N of the password blob.
    pub salt_len: usize,
    /// Path of the append-only key-custody file.
    pub key_file: PathBuf,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("user_token_secret", &"<redacted>")
            .field("api_token_secret", &"<redacted>")
            .field("email_index_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("salt_len", &self.salt_len)
            .field("key_file", &self.key_file)
            .finish()
    }
}

impl AuthConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                     | Default                             |
    /// |------------------------------|-------------------------------------|
    /// | `LOCKBOX_JWT_SECRET`         | generated & persisted to file       |
    /// | `LOCKBOX_API_KEY_SECRET`     | generated & persisted to file       |
    /// | `LOCKBOX_EMAIL_INDEX_SECRET` | generated & persisted to file       |
    /// | `LOCKBOX_ISSUER`             | `lockbox`                           |
    /// | `LOCKBOX_AUDIENCE`           | `lockbox-clients`                   |
    /// | `LOCKBOX_SALT_LEN`           | `32`                                |
    /// | `LOCKBOX_KEY_FILE`           | `$DATA_DIR/lockbox/envelope-keys`   |
    pub fn from_env() -> Result<Self, AuthError> {
        let salt_len = match std::env::var("LOCKBOX_SALT_LEN") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                AuthError::ValidationError(format!("LOCKBOX_SALT_LEN: {e}"))
            })?,
            Err(_) => DEFAULT_SALT_LEN,
        };

        let config = Self {
            user_token_secret: resolve_secret("LOCKBOX_JWT_SECRET", "jwt-secret"),
            api_token_secret: resolve_secret("LOCKBOX_API_KEY_SECRET", "api-key-secret"),
            email_index_secret: resolve_secret(
                "LOCKBOX_EMAIL_INDEX_SECRET",
                "email-index-secret",
            ),
            issuer: std::env::var("LOCKBOX_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.into()),
            audience: std::env::var("LOCKBOX_AUDIENCE")
                .unwrap_or_else(|_| DEFAULT_AUDIENCE.into()),
            salt_len,
            key_file: std::env::var("LOCKBOX_KEY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir().join("envelope-keys")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would merge the two trust domains or
    /// produce unusable salts.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.user_token_secret.is_empty() || self.api_token_secret.is_empty() {
            return Err(AuthError::ValidationError(
                "token secrets must not be empty".into(),
            ));
        }
        if self.email_index_secret.is_empty() {
            return Err(AuthError::ValidationError(
                "email index secret must not be empty".into(),
            ));
        }
        if self.user_token_secret == self.api_token_secret {
            return Err(AuthError::ValidationError(
                "user and API token secrets must differ".into(),
            ));
        }
        if self.salt_len == 0 {
            return Err(AuthError::ValidationError(
                "salt length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Resolve a signing secret: env var `var` → persisted file `file_name` →
/// generate and persist.
pub fn resolve_secret(var: &str, file_name: &str) -> String {
    if let Ok(secret) = std::env::var(var)
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = data_dir().join(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "could not create secret directory");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new signing secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            error = %e,
            "generated signing secret could not be persisted; tokens will not survive restart"
        ),
    }
    secret
}

/// Lockbox data directory.
///
/// Platform paths:
/// - macOS: `~/Library/Application Support/lockbox`
/// - Linux: `~/.local/share/lockbox`
/// - Windows: `%APPDATA%\lockbox`
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lockbox")
}

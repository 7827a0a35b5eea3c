//! API server configuration.

use lockbox_core::auth::AuthError;
use lockbox_core::config::AuthConfig;

/// Default pool size for the Postgres backend.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Hashing, signing and key-custody settings.
    pub auth: AuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default            |
    /// |---------------------------|--------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3200`   |
    /// | `DATABASE_URL`            | unset (in-memory)  |
    /// | `LOCKBOX_MAX_CONNECTIONS` | `5`                |
    ///
    /// Credential settings come from [`AuthConfig::from_env`].
    pub fn from_env() -> Result<Self, AuthError> {
        let max_connections = match std::env::var("LOCKBOX_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse::<u32>().map_err(|e| {
                AuthError::ValidationError(format!("LOCKBOX_MAX_CONNECTIONS: {e}"))
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            max_connections,
            auth: AuthConfig::from_env()?,
        })
    }
}

//! # lockbox_core
//!
//! Credential and session management for Lockbox: salted password hashing,
//! access and refresh tokens, the self-or-admin policy, and per-identity
//! envelope keys for sensitive fields.

pub mod auth;
pub mod config;
pub mod ids;
pub mod keystore;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

//! Domain models shared by the auth and keystore modules.

pub mod auth;
pub mod keys;

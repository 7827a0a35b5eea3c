//! Route paths.

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/auth/logout-all";
pub const POST_AUTH_API_KEY: &str = "/auth/api-key";
pub const IDENTITIES_ID: &str = "/identities/{id}";
pub const PUT_IDENTITIES_ID_PASSWORD: &str = "/identities/{id}/password";
pub const POST_IDENTITIES_ID_SECRETS_SEAL: &str = "/identities/{id}/secrets/seal";
pub const POST_IDENTITIES_ID_SECRETS_OPEN: &str = "/identities/{id}/secrets/open";
pub const GET_INTERNAL_WHOAMI: &str = "/internal/whoami";

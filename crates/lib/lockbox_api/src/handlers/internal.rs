//! Machine-facing handlers authenticated with API-domain tokens.

use axum::{Extension, Json};

use crate::middleware::auth::ApiCaller;
use crate::models::WhoAmIResponse;

/// `GET /internal/whoami`
pub async fn whoami_handler(
    Extension(ApiCaller(caller)): Extension<ApiCaller>,
) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        id: caller.identity_id().to_string(),
        role: caller.role().to_string(),
        purpose: caller.claims.purpose,
    })
}

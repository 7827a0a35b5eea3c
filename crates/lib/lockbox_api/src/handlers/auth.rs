//! Session request handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use axum_extra::extract::CookieJar;
use lockbox_core::auth::AuthError;
use lockbox_core::auth::jwt::ACCESS_TOKEN_EXPIRY_SECS;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{AuthenticatedUser, access_token};
use crate::models::{
    ApiKeyResponse, LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest,
    RegisterRequest, TokenResponse,
};
use crate::services::cookies;

/// Tokens for refresh and logout: the body first, then header and cookies.
/// The body itself is optional.
fn presented_tokens(
    body: Option<Json<RefreshRequest>>,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<(String, String), AuthError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let access = body
        .access_token
        .or_else(|| access_token(headers))
        .ok_or_else(|| AuthError::InvalidToken("missing access token".into()))?;
    let refresh = body
        .refresh_token
        .or_else(|| cookies::refresh_token(jar))
        .ok_or(AuthError::RefreshTokenNotFound)?;
    Ok((access, refresh))
}

/// `POST /auth/register`: create an identity and start a session.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let session = state.sessions.register(&body.email, &body.password).await?;
    Ok((
        cookies::with_session_cookies(jar, &session),
        Json(TokenResponse::from(&session)),
    ))
}

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let session = state.sessions.login(&body.email, &body.password).await?;
    Ok((
        cookies::with_session_cookies(jar, &session),
        Json(TokenResponse::from(&session)),
    ))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let (access, refresh) = presented_tokens(body, &headers, &jar)?;
    let session = state.sessions.refresh(&access, &refresh).await?;
    Ok((
        cookies::with_session_cookies(jar, &session),
        Json(TokenResponse::from(&session)),
    ))
}

/// `POST /auth/logout`: revoke one refresh token and clear cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Option<Json<LogoutRequest>>,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let (access, refresh) = presented_tokens(body, &headers, &jar)?;
    let revoked = state.sessions.logout(&access, &refresh).await?;
    Ok((
        cookies::clear_session_cookies(jar),
        Json(LogoutResponse {
            success: true,
            revoked: u64::from(revoked),
        }),
    ))
}

/// `POST /auth/logout-all`: revoke every refresh token of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let revoked = state.sessions.logout_all(&caller).await?;
    Ok((
        cookies::clear_session_cookies(jar),
        Json(LogoutResponse {
            success: true,
            revoked,
        }),
    ))
}

/// `POST /auth/api-key`: mint an API-domain token for the caller.
pub async fn api_key_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
) -> AppResult<Json<ApiKeyResponse>> {
    let api_key = state.sessions.issue_api_key(&caller).await?;
    Ok(Json(ApiKeyResponse {
        api_key,
        expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        token_type: "Bearer".to_string(),
    }))
}

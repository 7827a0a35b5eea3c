//! Authentication middleware: token extraction and verification for both
//! trust domains.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use lockbox_core::auth::AuthError;
use lockbox_core::models::auth::VerifiedToken;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::{ACCESS_COOKIE, ACCESS_SAME_SITE_COOKIE};

/// Verified end-user token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub VerifiedToken);

/// Verified API-domain token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct ApiCaller(pub VerifiedToken);

/// Bearer token from the `Authorization` header, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Access token from the header, then the `AccessToken` cookie, then its
/// `SameSite=None` twin.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| {
        let jar = CookieJar::from_headers(headers);
        [ACCESS_COOKIE, ACCESS_SAME_SITE_COOKIE]
            .into_iter()
            .filter_map(|name| jar.get(name))
            .map(|c| c.value().to_string())
            .find(|v| !v.is_empty())
    })
}

/// Rejects requests without a valid, unexpired user-domain token and injects
/// [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = access_token(request.headers())
        .ok_or_else(|| AppError::from(AuthError::InvalidToken("missing access token".into())))?;

    let verified = state.sessions.authenticate(&token).inspect_err(|e| {
        debug!(error = %e, path = %request.uri().path(), "access token rejected");
    })?;
    request.extensions_mut().insert(AuthenticatedUser(verified));

    Ok(next.run(request).await)
}

/// Rejects requests without a valid API-domain bearer token and injects
/// [`ApiCaller`]. Cookies are not consulted.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::from(AuthError::InvalidToken("missing api key".into())))?;

    let verified = state.sessions.authenticate_api(&token).inspect_err(|e| {
        debug!(error = %e, path = %request.uri().path(), "api key rejected");
    })?;
    request.extensions_mut().insert(ApiCaller(verified));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;

    use super::*;

    #[test]
    fn header_wins_over_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("AccessToken=from-cookie"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn falls_back_to_same_site_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; AccessTokenSameSite=cross-site"),
        );
        assert_eq!(access_token(&headers).as_deref(), Some("cross-site"));
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert!(bearer_token(&headers).is_none());
        assert!(access_token(&headers).is_none());
    }
}

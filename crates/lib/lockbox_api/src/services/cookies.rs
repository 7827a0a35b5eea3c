//! Session cookies.
//!
//! Each token is set twice: once with `SameSite=Lax` and once, under a
//! `…SameSite` name, with `SameSite=None` for cross-site embedding. All are
//! http-only and secure.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use lockbox_core::models::auth::Session;
use time::Duration;

pub const ACCESS_COOKIE: &str = "AccessToken";
pub const ACCESS_SAME_SITE_COOKIE: &str = "AccessTokenSameSite";
pub const REFRESH_COOKIE: &str = "RefreshToken";
pub const REFRESH_SAME_SITE_COOKIE: &str = "RefreshTokenSameSite";

/// Cookie lifetime, matching the refresh token.
const COOKIE_MAX_AGE: Duration = Duration::hours(24);

fn session_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    let same_site = if name.ends_with("SameSite") {
        SameSite::None
    } else {
        SameSite::Lax
    };
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(same_site)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Add all four session cookies for `session`.
pub fn with_session_cookies(jar: CookieJar, session: &Session) -> CookieJar {
    let access = session.access_token.clone();
    let refresh = session.refresh_token.value.clone();
    jar.add(session_cookie(ACCESS_COOKIE, access.clone(), COOKIE_MAX_AGE))
        .add(session_cookie(ACCESS_SAME_SITE_COOKIE, access, COOKIE_MAX_AGE))
        .add(session_cookie(REFRESH_COOKIE, refresh.clone(), COOKIE_MAX_AGE))
        .add(session_cookie(REFRESH_SAME_SITE_COOKIE, refresh, COOKIE_MAX_AGE))
}

/// Expire all four session cookies.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    [
        ACCESS_COOKIE,
        ACCESS_SAME_SITE_COOKIE,
        REFRESH_COOKIE,
        REFRESH_SAME_SITE_COOKIE,
    ]
    .into_iter()
    .fold(jar, |jar, name| {
        jar.add(session_cookie(name, String::new(), Duration::ZERO))
    })
}

/// Refresh token from the `RefreshToken` cookie or its `SameSite=None` twin.
pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    [REFRESH_COOKIE, REFRESH_SAME_SITE_COOKIE]
        .into_iter()
        .filter_map(|name| jar.get(name))
        .map(|c| c.value().to_string())
        .find(|v| !v.is_empty())
}

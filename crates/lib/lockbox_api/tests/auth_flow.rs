//! Integration tests: build the router on in-memory stores and drive the
//! session flows end to end.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use lockbox_api::AppState;
use lockbox_core::auth::identity::MemoryIdentityRepository;
use lockbox_core::auth::refresh::MemoryRefreshTokenStore;
use lockbox_core::auth::session::{SessionService, SessionStores};
use lockbox_core::config::AuthConfig;
use lockbox_core::keystore::memory::MemoryKeyCustody;
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app() -> Router {
    let config = AuthConfig {
        user_token_secret: "integration-user-secret".into(),
        api_token_secret: "integration-api-secret".into(),
        email_index_secret: "integration-index-secret".into(),
        issuer: "lockbox".into(),
        audience: "lockbox-clients".into(),
        salt_len: 32,
        key_file: "unused".into(),
    };
    let sessions = SessionService::new(
        &config,
        SessionStores {
            identities: Arc::new(MemoryIdentityRepository::new()),
            refresh_tokens: Arc::new(MemoryRefreshTokenStore::new()),
            key_custody: Arc::new(MemoryKeyCustody::new()),
        },
    );
    lockbox_api::router(AppState::new(sessions))
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    json: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    Reply {
        status,
        headers,
        json,
    }
}

async fn register(app: &Router, email: &str, password: &str) -> Value {
    let reply = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "register: {}", reply.json);
    reply.json
}

fn str_field<'a>(json: &'a Value, path: &[&str]) -> &'a str {
    path.iter()
        .fold(json, |v, key| &v[*key])
        .as_str()
        .unwrap_or_else(|| panic!("missing {path:?} in {json}"))
}

#[tokio::test]
async fn register_then_login_and_reject_bad_password() {
    let app = test_app();
    let registered = register(&app, "alice@example.com", "hunter2").await;
    assert_eq!(registered["tokenType"], "Bearer");
    assert_eq!(registered["identity"]["role"], "admin");
    assert_eq!(registered["expiresIn"], 900);

    let ok = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter2" })),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(
        str_field(&ok.json, &["identity", "id"]),
        str_field(&registered, &["identity", "id"])
    );

    let bad = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter3" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.json["error"], "invalid_credentials");

    let unknown = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "hunter2" })),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.json, bad.json);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = test_app();
    register(&app, "dup@example.com", "pw").await;
    let again = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "DUP@example.com", "password": "pw" })),
    )
    .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.json["error"], "validation_error");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app();
    let registered = register(&app, "bob@example.com", "pw").await;
    let id = str_field(&registered, &["identity", "id"]);

    let anonymous = send(&app, Method::GET, &format!("/identities/{id}"), None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json["error"], "invalid_token");

    let forged = send(
        &app,
        Method::GET,
        &format!("/identities/{id}"),
        Some("not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let token = str_field(&registered, &["accessToken"]);
    let own = send(&app, Method::GET, &format!("/identities/{id}"), Some(token), None).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.json["email"], "bob@example.com");
    assert!(own.json.get("passwordBlob").is_none());
}

#[tokio::test]
async fn access_token_cookie_authenticates() {
    let app = test_app();
    let registered = register(&app, "carol@example.com", "pw").await;
    let id = str_field(&registered, &["identity", "id"]);
    let token = str_field(&registered, &["accessToken"]);

    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("/identities/{id}"))
        .header(COOKIE, format!("AccessTokenSameSite={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_cookies_are_set_for_both_same_site_modes() {
    let app = test_app();
    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "dave@example.com", "password": "pw" })),
    )
    .await;
    let cookies: Vec<&str> = reply
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert_eq!(cookies.len(), 4, "{cookies:?}");

    let cross = cookies
        .iter()
        .find(|c| c.starts_with("AccessTokenSameSite="))
        .expect("AccessTokenSameSite cookie");
    assert!(cross.contains("SameSite=None"));
    assert!(cross.contains("HttpOnly"));
    assert!(cross.contains("Secure"));
    assert!(cross.contains("Max-Age=86400"));

    let plain = cookies
        .iter()
        .find(|c| c.starts_with("RefreshToken="))
        .expect("RefreshToken cookie");
    assert!(plain.contains("SameSite=Lax"));
}

#[tokio::test]
async fn refresh_rotates_and_replay_is_rejected() {
    let app = test_app();
    let registered = register(&app, "erin@example.com", "pw").await;
    let access = str_field(&registered, &["accessToken"]);
    let refresh = str_field(&registered, &["refreshToken"]);

    let rotated = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "accessToken": access, "refreshToken": refresh })),
    )
    .await;
    assert_eq!(rotated.status, StatusCode::OK, "{}", rotated.json);
    let next_refresh = str_field(&rotated.json, &["refreshToken"]);
    assert_ne!(next_refresh, refresh);

    let replay = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "accessToken": access, "refreshToken": refresh })),
    )
    .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.json["error"], "refresh_token_not_found");

    // Header carries the access token; body carries only the refresh token.
    let via_header = send(
        &app,
        Method::POST,
        "/auth/refresh",
        Some(access),
        Some(json!({ "refreshToken": next_refresh })),
    )
    .await;
    assert_eq!(via_header.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_presented_refresh_token() {
    let app = test_app();
    let registered = register(&app, "frank@example.com", "pw").await;
    let access = str_field(&registered, &["accessToken"]);
    let refresh = str_field(&registered, &["refreshToken"]);

    let out = send(
        &app,
        Method::POST,
        "/auth/logout",
        Some(access),
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(out.json["revoked"], 1);

    let after = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "accessToken": access, "refreshToken": refresh })),
    )
    .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_all_ends_every_session() {
    let app = test_app();
    let registered = register(&app, "gina@example.com", "pw").await;
    let access = str_field(&registered, &["accessToken"]);
    let login = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "gina@example.com", "password": "pw" })),
    )
    .await;
    let second_refresh = str_field(&login.json, &["refreshToken"]);

    let out = send(&app, Method::POST, "/auth/logout-all", Some(access), None).await;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(out.json["revoked"], 2);

    let after = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "accessToken": access, "refreshToken": second_refresh })),
    )
    .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn self_or_admin_guards_identity_routes() {
    let app = test_app();
    let admin = register(&app, "root@example.com", "pw").await;
    let alice = register(&app, "alice@example.com", "pw").await;
    let bob = register(&app, "bob@example.com", "pw").await;
    assert_eq!(alice["identity"]["role"], "user");

    let alice_token = str_field(&alice, &["accessToken"]);
    let bob_id = str_field(&bob, &["identity", "id"]);

    let denied = send(
        &app,
        Method::GET,
        &format!("/identities/{bob_id}"),
        Some(alice_token),
        None,
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.json["error"], "unauthorized");

    let admin_token = str_field(&admin, &["accessToken"]);
    let allowed = send(
        &app,
        Method::GET,
        &format!("/identities/{bob_id}"),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(allowed.status, StatusCode::OK);

    let deleted = send(
        &app,
        Method::DELETE,
        &format!("/identities/{bob_id}"),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = send(
        &app,
        Method::GET,
        &format!("/identities/{bob_id}"),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let malformed = send(
        &app,
        Method::GET,
        "/identities/not-a-uuid",
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn change_password_invalidates_old_credentials() {
    let app = test_app();
    let registered = register(&app, "hank@example.com", "hunter2").await;
    let id = str_field(&registered, &["identity", "id"]);
    let access = str_field(&registered, &["accessToken"]);
    let refresh = str_field(&registered, &["refreshToken"]);

    let changed = send(
        &app,
        Method::PUT,
        &format!("/identities/{id}/password"),
        Some(access),
        Some(json!({ "newPassword": "correct horse" })),
    )
    .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let old = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "hank@example.com", "password": "hunter2" })),
    )
    .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "hank@example.com", "password": "correct horse" })),
    )
    .await;
    assert_eq!(new.status, StatusCode::OK);

    let stale = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "accessToken": access, "refreshToken": refresh })),
    )
    .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn seal_and_open_secret_fields() {
    let app = test_app();
    let owner = register(&app, "ivy@example.com", "pw").await;
    let other = register(&app, "jack@example.com", "pw").await;
    let id = str_field(&owner, &["identity", "id"]);
    let token = str_field(&owner, &["accessToken"]);

    let sealed = send(
        &app,
        Method::POST,
        &format!("/identities/{id}/secrets/seal"),
        Some(token),
        Some(json!({ "plaintext": "github.com" })),
    )
    .await;
    assert_eq!(sealed.status, StatusCode::OK);
    let ciphertext = str_field(&sealed.json, &["ciphertext"]);
    assert_ne!(ciphertext, "github.com");

    let opened = send(
        &app,
        Method::POST,
        &format!("/identities/{id}/secrets/open"),
        Some(token),
        Some(json!({ "ciphertext": ciphertext })),
    )
    .await;
    assert_eq!(opened.status, StatusCode::OK);
    assert_eq!(opened.json["plaintext"], "github.com");

    let other_token = str_field(&other, &["accessToken"]);
    let foreign = send(
        &app,
        Method::POST,
        &format!("/identities/{id}/secrets/open"),
        Some(other_token),
        Some(json!({ "ciphertext": ciphertext })),
    )
    .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let tampered = send(
        &app,
        Method::POST,
        &format!("/identities/{id}/secrets/open"),
        Some(token),
        Some(json!({ "ciphertext": "AAAAAAAAAAAAAAAAAAAAAAAA" })),
    )
    .await;
    assert_eq!(tampered.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_keys_and_user_tokens_stay_in_their_domains() {
    let app = test_app();
    let registered = register(&app, "kim@example.com", "pw").await;
    let access = str_field(&registered, &["accessToken"]);

    let minted = send(&app, Method::POST, "/auth/api-key", Some(access), None).await;
    assert_eq!(minted.status, StatusCode::OK);
    let api_key = str_field(&minted.json, &["apiKey"]);

    let whoami = send(&app, Method::GET, "/internal/whoami", Some(api_key), None).await;
    assert_eq!(whoami.status, StatusCode::OK);
    assert_eq!(whoami.json["purpose"], "api_key");
    assert_eq!(whoami.json["id"], registered["identity"]["id"]);

    let user_on_api = send(&app, Method::GET, "/internal/whoami", Some(access), None).await;
    assert_eq!(user_on_api.status, StatusCode::UNAUTHORIZED);

    let id = str_field(&registered, &["identity", "id"]);
    let api_on_user = send(
        &app,
        Method::GET,
        &format!("/identities/{id}"),
        Some(api_key),
        None,
    )
    .await;
    assert_eq!(api_on_user.status, StatusCode::UNAUTHORIZED);
}

async fn send_with_cookies(app: &Router, uri: &str, cookies: &str) -> Reply {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(COOKIE, cookies)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    Reply {
        status,
        headers,
        json,
    }
}

#[tokio::test]
async fn refresh_and_logout_work_from_cookies_alone() {
    let app = test_app();
    let registered = register(&app, "lena@example.com", "pw").await;
    let access = str_field(&registered, &["accessToken"]);
    let refresh = str_field(&registered, &["refreshToken"]);

    let rotated = send_with_cookies(
        &app,
        "/auth/refresh",
        &format!("AccessToken={access}; RefreshToken={refresh}"),
    )
    .await;
    assert_eq!(rotated.status, StatusCode::OK, "{}", rotated.json);
    assert!(rotated.headers.get_all(SET_COOKIE).iter().count() >= 4);
    let next_access = str_field(&rotated.json, &["accessToken"]);
    let next_refresh = str_field(&rotated.json, &["refreshToken"]);

    let out = send_with_cookies(
        &app,
        "/auth/logout",
        &format!("AccessTokenSameSite={next_access}; RefreshTokenSameSite={next_refresh}"),
    )
    .await;
    assert_eq!(out.status, StatusCode::OK, "{}", out.json);
    assert_eq!(out.json["revoked"], 1);

    let missing = send_with_cookies(&app, "/auth/refresh", &format!("AccessToken={access}")).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json["error"], "refresh_token_not_found");
}

//! # lockbox_api
//!
//! HTTP edge for Lockbox: session endpoints, identity management and field
//! sealing over [`lockbox_core`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use lockbox_core::auth::session::SessionService;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, identities, internal};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(sessions: SessionService) -> Self {
        Self {
            sessions: Arc::new(sessions),
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // End-user routes (user-domain token)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(routes::POST_AUTH_API_KEY, post(auth::api_key_handler))
        .route(
            routes::IDENTITIES_ID,
            get(identities::get_identity_handler).delete(identities::delete_identity_handler),
        )
        .route(
            routes::PUT_IDENTITIES_ID_PASSWORD,
            put(identities::change_password_handler),
        )
        .route(
            routes::POST_IDENTITIES_ID_SECRETS_SEAL,
            post(identities::seal_secret_handler),
        )
        .route(
            routes::POST_IDENTITIES_ID_SECRETS_OPEN,
            post(identities::open_secret_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Machine routes (API-domain token)
    let machine = Router::new()
        .route(routes::GET_INTERNAL_WHOAMI, get(internal::whoami_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_api_key,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(machine)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

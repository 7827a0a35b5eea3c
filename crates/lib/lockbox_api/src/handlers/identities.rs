//! Identity-scoped handlers. Every route is self-or-admin.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use lockbox_core::models::keys::SecretField;

use super::parse_identity_id;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ChangePasswordRequest, IdentityResponse, OpenRequest, OpenResponse, SealRequest, SealResponse,
};

/// `GET /identities/{id}`
pub async fn get_identity_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<IdentityResponse>> {
    let target = parse_identity_id(&id)?;
    let identity = state.sessions.get_identity(&caller, target).await?;
    Ok(Json(identity.into()))
}

/// `DELETE /identities/{id}`
pub async fn delete_identity_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let target = parse_identity_id(&id)?;
    state.sessions.delete_identity(&caller, target).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /identities/{id}/password`: also ends every session of the target.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let target = parse_identity_id(&id)?;
    state
        .sessions
        .change_password(&caller, target, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /identities/{id}/secrets/seal`
pub async fn seal_secret_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(body): Json<SealRequest>,
) -> AppResult<Json<SealResponse>> {
    let owner = parse_identity_id(&id)?;
    let sealed = state
        .sessions
        .seal_secret(&caller, owner, &body.plaintext)
        .await?;
    Ok(Json(SealResponse {
        ciphertext: sealed.0,
    }))
}

/// `POST /identities/{id}/secrets/open`
pub async fn open_secret_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(body): Json<OpenRequest>,
) -> AppResult<Json<OpenResponse>> {
    let owner = parse_identity_id(&id)?;
    let plaintext = state
        .sessions
        .open_secret(&caller, owner, &SecretField(body.ciphertext))
        .await?;
    Ok(Json(OpenResponse { plaintext }))
}

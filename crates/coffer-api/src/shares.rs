use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use coffer_crypto::token_hint;
use coffer_types::api::{
    Claims, CreateShareRequest, CreateShareResponse, PasswordQuery, StatusResponse,
};
use coffer_types::models::ShareLink;

use crate::error::ApiError;
use crate::files::attachment;
use crate::state::AppState;

/// POST /api/share: only for files the caller owns.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if state.vault.find(claims.sub, req.file_id)?.is_none() {
        warn!(file_id = %req.file_id, owner_id = %claims.sub, "Share requested for a file the caller does not own");
        return Err(ApiError::NotFound);
    }

    let link = state.shares.issue(
        req.file_id,
        claims.sub,
        req.expires_in_minutes,
        req.max_downloads,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse {
            url: format!("/share/{}/download", link.token),
            token: link.token,
            expires_at: link.expires_at,
            max_downloads: link.max_downloads,
        }),
    ))
}

/// GET /api/share: links the caller created.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ShareLink>>, ApiError> {
    Ok(Json(state.shares.list(claims.sub)?))
}

/// DELETE /api/share/{token}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.shares.delete(&token, claims.sub)?;
    Ok(Json(StatusResponse {
        status: "deleted".into(),
    }))
}

/// GET /share/{token}/download?password=
///
/// Public. Every dead-link cause, including a malformed token, gets the same 404.
/// A missing password is a 400 and leaves the link untouched.
pub async fn download(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<PasswordQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let password = Zeroizing::new(query.password);
    if password.is_empty() {
        return Err(ApiError::BadRequest("password is required".into()));
    }
    let (bytes, filename) = state
        .shares
        .redeem(&state.vault, &token, &password)
        .await
        .map_err(|err| {
            debug!(token = token_hint(&token), "Share download refused: {err}");
            match err {
                coffer_core::Error::Validation(_) => ApiError::DeadLink,
                err if err.is_dead_link() => ApiError::DeadLink,
                err => ApiError::from(err),
            }
        })?;

    Ok(attachment(bytes, &filename))
}

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use coffer_types::api::{
    ChangePasswordRequest, Claims, PasswordQuery, StatusResponse, UploadResponse,
};
use coffer_types::models::EncryptedFile;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/files: multipart form with a `file` part and a `password` part.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut password: Option<Zeroizing<String>> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("password") => {
                password = Some(Zeroizing::new(field.text().await?));
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("missing file part".into()))?;
    let password =
        password.ok_or_else(|| ApiError::BadRequest("missing password part".into()))?;

    let record = state
        .vault
        .store(claims.sub, &filename, bytes, &password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: record.id,
            filename: record.filename,
            size: record.size,
            created_at: record.created_at,
        }),
    ))
}

/// GET /api/files: caller's files, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<EncryptedFile>>, ApiError> {
    Ok(Json(state.vault.list(claims.sub)?))
}

/// GET /api/files/{id}/download?password=
pub async fn download(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
    Query(query): Query<PasswordQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let password = Zeroizing::new(query.password);
    let (bytes, filename) = state.vault.retrieve(claims.sub, file_id, &password).await?;
    Ok(attachment(bytes, &filename))
}

/// PATCH /api/files/{id}/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let old_password = Zeroizing::new(req.old_password);
    let new_password = Zeroizing::new(req.new_password);
    state
        .vault
        .rekey(claims.sub, file_id, &old_password, &new_password)
        .await?;

    Ok(Json(StatusResponse {
        status: "ok".into(),
    }))
}

/// DELETE /api/files/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.vault.delete(claims.sub, file_id).await?;
    info!(file_id = %file_id, "File deleted via API");

    Ok(Json(StatusResponse {
        status: "deleted".into(),
    }))
}

/// Decrypted bytes as a download named after the original upload.
pub(crate) fn attachment(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
        ],
        bytes,
    )
        .into_response()
}

/// Header-safe `Content-Disposition`. Anything outside printable ASCII, plus
/// quotes and backslashes, becomes `_`.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use coffer_types::api::ErrorResponse;

/// Handler error, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Account login or bearer token rejected.
    #[error("invalid credentials")]
    Unauthorized,

    /// Wrong file password and unknown file share this message.
    #[error("invalid password or file not found")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    /// Unknown, expired, exhausted or deleted share link.
    #[error("share link is invalid or expired")]
    DeadLink,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("internal server error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<coffer_core::Error> for ApiError {
    fn from(err: coffer_core::Error) -> Self {
        use coffer_core::Error;
        match err {
            Error::Validation(msg) => ApiError::BadRequest(msg.to_string()),
            Error::AccessDenied => ApiError::AccessDenied,
            Error::NotFound => ApiError::NotFound,
            Error::Expired | Error::Exhausted => ApiError::DeadLink,
            Error::Storage(e) | Error::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::AccessDenied => StatusCode::UNAUTHORIZED,
            ApiError::NotFound | ApiError::DeadLink => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Multipart(e) => e.status(),
            ApiError::Internal(e) => {
                error!("Request failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

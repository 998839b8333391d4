//! HTTP surface for the coffer vault: account auth, file routes and share
//! links.

pub mod auth;
pub mod error;
pub mod files;
pub mod middleware;
pub mod shares;
pub mod state;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, patch, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// Build the full router. Auth-protected routes sit behind [`middleware::require_auth`].
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/share/{token}/download", get(shares::download))
        .route("/health", get(health));

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/files", post(files::upload).get(files::list))
        .route("/api/files/{id}", delete(files::delete))
        .route("/api/files/{id}/download", get(files::download))
        .route("/api/files/{id}/password", patch(files::change_password))
        .route("/api/share", post(shares::create).get(shares::list))
        .route("/api/share/{token}", delete(shares::delete))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Passwords ride in query strings, so spans carry the path only.
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        tracing::debug_span!("request", method = %req.method(), path = %req.uri().path())
    });

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

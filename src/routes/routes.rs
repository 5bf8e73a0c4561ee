//! Defines routes for the photo upload service.
//!
//! ## Structure
//! - **Photo endpoints**
//!   - `POST   /upload` — multipart photo batch upload keyed by personal code
//!   - `GET    /photos/{personalCode}` — list stored photos for a code
//!   - `DELETE /photos/{personalCode}` — drop a code and unlink its files
//!
//! - **Static endpoints**
//!   - `GET /` — index page from the public directory
//!   - `GET /uploads/{*path}` — stored file bytes
//!
//! The wildcard `*path` is validated by the store before any disk access.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        photo_handlers::{delete_photos, get_photos, index, serve_upload, upload_photos},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Upper bound on one multipart request; a batch of phone photos fits well
/// within this.
const MAX_BODY_BYTES: usize = 128 * 1024 * 1024;

/// Build and return the router for all photo and static routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Photo endpoints
        .route("/upload", post(upload_photos))
        .route(
            "/photos/{personalCode}",
            get(get_photos).delete(delete_photos),
        )
        // Static endpoints
        .route("/", get(index))
        .route("/uploads/{*path}", get(serve_upload))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

//! HTTP handlers for photo upload, retrieval, and deletion by personal code,
//! plus the static index page and stored-file serving. Multipart parsing
//! happens here; storage concerns are delegated to `PhotoStore`.

use crate::{
    errors::AppError,
    models::photo::IncomingPhoto,
    services::photo_store::UPLOAD_FIELD,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, Response},
};
use serde::Serialize;
use std::{collections::HashMap, io::ErrorKind};
use tokio_util::io::ReaderStream;
use tracing::info;

/// Multipart text field carrying the personal code.
const CODE_FIELD: &str = "personalCode";
/// Prefix of the per-file metadata text fields (`metadata0`, `metadata1`, ...).
const METADATA_PREFIX: &str = "metadata";

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PhotoView {
    pub url: String,
    pub metadata: String,
}

#[derive(Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<PhotoView>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST `/upload` — store a batch of photos under a personal code.
///
/// Accepts one `personalCode` text field, any number of file parts under
/// `photos`, and optional `metadata{i}` text fields paired with the i-th file
/// by submission order. Replaces whatever was previously stored under the
/// code. 400 when the code is missing or empty.
pub async fn upload_photos(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut code: Option<String> = None;
    let mut photos: Vec<IncomingPhoto> = Vec::new();
    let mut metadata: HashMap<usize, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart request: {}", err)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            CODE_FIELD => {
                code = Some(field.text().await.map_err(|err| {
                    AppError::bad_request(format!("unreadable {} field: {}", CODE_FIELD, err))
                })?);
            }
            UPLOAD_FIELD => {
                let original_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("unreadable file part: {}", err))
                })?;
                photos.push(IncomingPhoto {
                    original_name,
                    data,
                    metadata: String::new(),
                });
            }
            other => {
                if let Some(index) = other
                    .strip_prefix(METADATA_PREFIX)
                    .and_then(|s| s.parse::<usize>().ok())
                {
                    let value = field.text().await.map_err(|err| {
                        AppError::bad_request(format!("unreadable {} field: {}", other, err))
                    })?;
                    metadata.insert(index, value);
                }
                // Unknown fields are ignored.
            }
        }
    }

    pair_metadata(&mut photos, metadata);

    let code = code.unwrap_or_default();
    let count = state.store.store_batch(&code, photos).await?;
    info!(code = %code.trim(), count, "stored photo batch");

    Ok(Json(UploadResponse {
        message: "Photos uploaded successfully".into(),
        count,
    }))
}

/// Attach `metadata{i}` values to the i-th file part. Files without a paired
/// metadata field keep an empty string; indexes beyond the file count are
/// dropped.
fn pair_metadata(photos: &mut [IncomingPhoto], mut metadata: HashMap<usize, String>) {
    for (index, photo) in photos.iter_mut().enumerate() {
        if let Some(value) = metadata.remove(&index) {
            photo.metadata = value;
        }
    }
}

/// GET `/photos/{personalCode}` — list stored photos for a code.
///
/// Records come back in upload order, each rewritten to the URL it is served
/// under. 404 when the code is unknown.
pub async fn get_photos(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let records = state.store.list(&code)?;
    let photos = records
        .into_iter()
        .map(|record| PhotoView {
            url: format!("/uploads/{}", record.file_name),
            metadata: record.metadata,
        })
        .collect();

    Ok(Json(PhotoListResponse { photos }))
}

/// DELETE `/photos/{personalCode}` — drop a code and unlink its files.
///
/// Idempotent: always 200, whether or not the code existed. Unlink failures
/// are logged by the store, never surfaced.
pub async fn delete_photos(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Json<MessageResponse> {
    let removed = state.store.remove(&code).await;
    info!(code = %code, removed, "deleted photo batch");

    Json(MessageResponse {
        message: "Photos deleted successfully".into(),
    })
}

/// GET `/uploads/{*path}` — stream a stored file back to the client.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let (file, len, content_type) = state.store.open_upload(&path).await?;
    let stream = ReaderStream::new(file);

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}

/// GET `/` — serve the index page from the public directory.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let path = state.public_dir.join("index.html");
    let page = tokio::fs::read_to_string(&path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            AppError::not_found("index page not found")
        } else {
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to read index page: {}", err),
            )
        }
    })?;
    Ok(Html(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn part(metadata: &str) -> IncomingPhoto {
        IncomingPhoto {
            original_name: None,
            data: Bytes::new(),
            metadata: metadata.to_string(),
        }
    }

    #[test]
    fn metadata_pairs_by_file_index() {
        let mut photos = vec![part(""), part(""), part("")];
        let metadata = HashMap::from([
            (0, "first".to_string()),
            (2, "third".to_string()),
            (9, "dangling".to_string()),
        ]);

        pair_metadata(&mut photos, metadata);

        assert_eq!(photos[0].metadata, "first");
        assert_eq!(photos[1].metadata, "");
        assert_eq!(photos[2].metadata, "third");
    }
}

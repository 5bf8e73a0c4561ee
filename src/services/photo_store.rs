//! src/services/photo_store.rs
//!
//! PhotoStore — the one stateful piece of the service: an in-memory registry
//! mapping a personal code to the ordered list of photos stored under it,
//! backed by files written beneath `upload_dir`. The registry is intentionally
//! not persisted across restarts; a restart forgets every code.

use crate::models::photo::{IncomingPhoto, PhotoRecord};
use chrono::Utc;
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;
use tokio::fs::{self, File};
use tracing::{debug, warn};
use uuid::Uuid;

/// All file parts arrive under this multipart field name, and generated
/// filenames start with it (fieldname-timestamp-suffix.ext).
pub const UPLOAD_FIELD: &str = "photos";

const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("personal code is required")]
    EmptyCode,
    #[error("no photos found for code `{0}`")]
    CodeNotFound(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error("invalid file path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// PhotoStore provides the three operations the service is built around:
/// - Store a batch (writes files to disk, then replaces the registry entry)
/// - List a batch (reads the registry, preserving upload order)
/// - Remove a batch (drops the registry entry, best-effort unlinks files)
///
/// It also opens stored files for the static `/uploads` route. The struct is
/// cheap to clone and owns its state, so tests construct isolated instances
/// instead of sharing ambient globals.
#[derive(Clone)]
pub struct PhotoStore {
    /// Registry: personal code -> photos in submission order. Guarded by a
    /// plain mutex; it is only held for map operations, never across awaits.
    registry: Arc<Mutex<HashMap<String, Vec<PhotoRecord>>>>,

    /// Base directory on disk where photo payloads are stored.
    pub upload_dir: PathBuf,
}

impl PhotoStore {
    /// Create a new PhotoStore writing payloads beneath `upload_dir`.
    /// The directory itself is created by the caller (see `main`).
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            upload_dir: upload_dir.into(),
        }
    }

    fn lock_registry(&self) -> MutexGuard<'_, HashMap<String, Vec<PhotoRecord>>> {
        // A poisoning panic cannot leave the map in a torn state (every
        // critical section is a single map call), so recover the guard.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Basic path validation for client-requested file reads.
    ///
    /// Rejects paths that begin with `/` or contain `..`, so `/uploads/...`
    /// requests cannot escape the upload directory.
    fn ensure_path_safe(&self, path: &str) -> StoreResult<()> {
        if path.is_empty() || path.starts_with('/') || path.contains("..") {
            return Err(StoreError::InvalidPath);
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidPath);
        }
        Ok(())
    }

    /// Generate a unique on-disk name for an uploaded file.
    ///
    /// Mirrors the classic disk-storage convention of field name plus
    /// millisecond timestamp plus original extension, with a random suffix so
    /// files landing in the same millisecond never collide.
    fn generate_name(original_name: Option<&str>) -> String {
        let ext = original_name
            .map(sanitized_extension)
            .unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}{}",
            UPLOAD_FIELD,
            Utc::now().timestamp_millis(),
            &suffix[..8],
            ext
        )
    }

    fn disk_path(&self, file_name: &str) -> PathBuf {
        self.upload_dir.join(file_name)
    }

    /// Write one photo payload to disk and return its registry record.
    ///
    /// Bytes go to a temporary file first and are renamed into the final
    /// name, so a partially-written payload is never visible under a served
    /// name. The temp file is removed on error.
    async fn write_photo(&self, photo: &IncomingPhoto) -> StoreResult<PhotoRecord> {
        let file_name = Self::generate_name(photo.original_name.as_deref());
        let tmp_path = self.upload_dir.join(format!(".tmp-{}", Uuid::new_v4()));

        if let Err(err) = fs::write(&tmp_path, &photo.data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, self.disk_path(&file_name)).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        Ok(PhotoRecord {
            file_name,
            metadata: photo.metadata.clone(),
            size_bytes: photo.data.len() as u64,
            uploaded_at: Utc::now(),
        })
    }

    /// Store a batch of photos under `code`, replacing (never merging with)
    /// any batch previously stored under the same code.
    ///
    /// Files are written before the registry is touched, and the two steps
    /// are not atomic: an I/O failure mid-batch leaves the already-written
    /// files on disk and the registry unchanged. Returns the stored count.
    pub async fn store_batch(
        &self,
        code: &str,
        photos: Vec<IncomingPhoto>,
    ) -> StoreResult<usize> {
        let code = code.trim();
        if code.is_empty() {
            return Err(StoreError::EmptyCode);
        }

        let mut records = Vec::with_capacity(photos.len());
        for photo in &photos {
            let record = self.write_photo(photo).await?;
            debug!(
                file = %record.file_name,
                size = record.size_bytes,
                "stored photo payload"
            );
            records.push(record);
        }

        let count = records.len();
        let previous = self.lock_registry().insert(code.to_string(), records);
        if let Some(old) = previous {
            // Last write wins; the replaced batch's files stay on disk until
            // the code is deleted. Known gap, kept from the original design.
            debug!(code, replaced = old.len(), "replaced existing batch");
        }

        Ok(count)
    }

    /// Return the records stored under `code` in upload order.
    pub fn list(&self, code: &str) -> StoreResult<Vec<PhotoRecord>> {
        self.lock_registry()
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::CodeNotFound(code.to_string()))
    }

    /// Remove the batch stored under `code`, if any, and unlink its files.
    ///
    /// Idempotent and infallible from the caller's view: a missing code is a
    /// no-op, and a failed unlink is logged but never surfaced. The registry
    /// entry is dropped even when some unlinks fail, which can orphan files.
    /// Returns the number of records that were registered under the code.
    pub async fn remove(&self, code: &str) -> usize {
        let Some(records) = self.lock_registry().remove(code) else {
            return 0;
        };

        let count = records.len();
        for record in records {
            let path = self.disk_path(&record.file_name);
            match fs::remove_file(&path).await {
                Ok(_) => debug!("removed {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("file {} already missing", path.display());
                }
                Err(err) => warn!("failed to remove {}: {}", path.display(), err),
            }
        }
        count
    }

    /// Open a stored file for streaming out via `/uploads/{*path}`.
    ///
    /// Validates the requested path and returns the opened file plus its
    /// length and a content type guessed from the extension.
    pub async fn open_upload(&self, path: &str) -> StoreResult<(File, u64, &'static str)> {
        self.ensure_path_safe(path)?;
        let disk_path = self.upload_dir.join(path);
        let file = File::open(&disk_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::FileNotFound(path.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len, content_type_for(Path::new(path))))
    }
}

/// Extract and sanitize the extension of a client-supplied filename.
/// Returns `".jpg"`-style strings, or empty when there is no usable extension.
fn sanitized_extension(name: &str) -> String {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext)
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Guess a response content type from a stored file's extension.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn store() -> (PhotoStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (PhotoStore::new(dir.path()), dir)
    }

    fn photo(name: &str, data: &str, metadata: &str) -> IncomingPhoto {
        IncomingPhoto {
            original_name: Some(name.to_string()),
            data: Bytes::from(data.as_bytes().to_vec()),
            metadata: metadata.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_code_is_rejected() {
        let (store, _dir) = store();
        let err = store
            .store_batch("", vec![photo("a.jpg", "x", "")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyCode));

        let err = store.store_batch("   ", vec![]).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyCode));
    }

    #[tokio::test]
    async fn batch_round_trips_in_order_with_metadata() {
        let (store, _dir) = store();
        let count = store
            .store_batch(
                "abc123",
                vec![
                    photo("one.jpg", "first", "datetime:2026-08-25T10:00:00Z"),
                    photo("two.png", "second", "location:52.37,4.89"),
                    photo("three.heic", "third", ""),
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 3);

        let records = store.list("abc123").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].metadata, "datetime:2026-08-25T10:00:00Z");
        assert_eq!(records[1].metadata, "location:52.37,4.89");
        assert_eq!(records[2].metadata, "");
        assert!(records[0].file_name.ends_with(".jpg"));
        assert!(records[1].file_name.ends_with(".png"));
        assert!(records[2].file_name.ends_with(".heic"));

        for record in &records {
            assert!(store.upload_dir.join(&record.file_name).exists());
        }
    }

    #[tokio::test]
    async fn reupload_replaces_previous_batch() {
        let (store, _dir) = store();
        store
            .store_batch("code", vec![photo("a.jpg", "a", "ma"), photo("b.jpg", "b", "mb")])
            .await
            .unwrap();
        store
            .store_batch("code", vec![photo("c.jpg", "c", "mc")])
            .await
            .unwrap();

        let records = store.list("code").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata, "mc");
    }

    #[tokio::test]
    async fn empty_batch_with_valid_code_is_accepted() {
        let (store, _dir) = store();
        let count = store.store_batch("code", vec![]).await.unwrap();
        assert_eq!(count, 0);
        assert!(store.list("code").unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_code_lookup_fails() {
        let (store, _dir) = store();
        assert!(matches!(
            store.list("nope"),
            Err(StoreError::CodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_unlinks_files() {
        let (store, _dir) = store();
        assert_eq!(store.remove("nope").await, 0);

        store
            .store_batch("code", vec![photo("a.jpg", "a", ""), photo("b.jpg", "b", "")])
            .await
            .unwrap();
        let records = store.list("code").unwrap();

        assert_eq!(store.remove("code").await, 2);
        assert!(matches!(
            store.list("code"),
            Err(StoreError::CodeNotFound(_))
        ));
        for record in records {
            assert!(!store.upload_dir.join(&record.file_name).exists());
        }

        assert_eq!(store.remove("code").await, 0);
    }

    #[tokio::test]
    async fn generated_names_never_collide_within_a_batch() {
        let (store, _dir) = store();
        let batch = (0..16).map(|i| photo("p.jpg", "x", &i.to_string())).collect();
        store.store_batch("code", batch).await.unwrap();

        let names: HashSet<String> = store
            .list("code")
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names.len(), 16);
    }

    #[tokio::test]
    async fn open_upload_serves_stored_bytes_and_rejects_traversal() {
        let (store, _dir) = store();
        store
            .store_batch("code", vec![photo("a.jpg", "payload", "")])
            .await
            .unwrap();
        let name = store.list("code").unwrap()[0].file_name.clone();

        let (_file, len, content_type) = store.open_upload(&name).await.unwrap();
        assert_eq!(len, "payload".len() as u64);
        assert_eq!(content_type, "image/jpeg");

        assert!(matches!(
            store.open_upload("../secret").await,
            Err(StoreError::InvalidPath)
        ));
        assert!(matches!(
            store.open_upload("/etc/passwd").await,
            Err(StoreError::InvalidPath)
        ));
        assert!(matches!(
            store.open_upload("missing.jpg").await,
            Err(StoreError::FileNotFound(_))
        ));
    }

    #[test]
    fn extension_sanitizing() {
        assert_eq!(sanitized_extension("photo.JPG"), ".jpg");
        assert_eq!(sanitized_extension("photo"), "");
        assert_eq!(sanitized_extension("photo."), "");
        assert_eq!(sanitized_extension("weird.ex!t"), "");
    }
}

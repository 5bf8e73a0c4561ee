//! Represents photos flowing through the service: incoming multipart parts
//! and the records the registry keeps for stored files.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file part extracted from a multipart upload, paired with the metadata
/// string the client submitted alongside it.
#[derive(Debug)]
pub struct IncomingPhoto {
    /// Original filename as reported by the client, if any. Only its
    /// extension survives into the generated on-disk name.
    pub original_name: Option<String>,

    /// Raw file bytes.
    pub data: Bytes,

    /// Opaque client-composed metadata (e.g. `datetime:...|location:...`).
    /// The service never parses it.
    pub metadata: String,
}

/// One stored photo as tracked by the registry.
///
/// The record holds the generated on-disk name, not a full path; the store
/// resolves it against its upload directory for disk access and handlers
/// rewrite it to a `/uploads/...` URL for clients.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PhotoRecord {
    /// Generated unique filename within the upload directory.
    pub file_name: String,

    /// Opaque metadata string, returned verbatim on retrieval.
    pub metadata: String,

    /// Size in bytes, as written.
    pub size_bytes: u64,

    /// When the file was stored.
    pub uploaded_at: DateTime<Utc>,
}

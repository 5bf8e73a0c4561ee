use crate::services::photo_store::PhotoStore;
use std::path::PathBuf;

/// Shared state handed to every handler: the photo store plus the directory
/// static assets are served from.
#[derive(Clone)]
pub struct AppState {
    pub store: PhotoStore,
    pub public_dir: PathBuf,
}

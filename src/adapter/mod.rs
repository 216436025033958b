//! Persistence adapter trait and shared types.
//!
//! The [`PersistenceAdapter`] trait is the only seam between the in-memory
//! store and wherever images actually live (a hosted backend, a local
//! directory, a test double). Transport details such as endpoints, auth
//! headers and buckets belong to the implementation, never to the store.
//!
//! The bundled implementation is [`FsAdapter`](fs::FsAdapter), a
//! content-addressed local directory used by the CLI and integration tests.

pub mod fs;

use crate::types::{ImageRecord, ImageType};
use crate::upload::UploadFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Transport failed: {0}")]
    Transport(String),
    #[error("Image not found: {0}")]
    NotFound(String),
}

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Record id assigned by the backend.
    pub id: String,
    /// Public locator for the blob.
    pub url: String,
    /// Backend-relative storage path.
    pub path: String,
}

/// Trait for persistence backends.
///
/// `Sync` because [`ImageStore::upload`](crate::store::ImageStore::upload)
/// fans uploads out over rayon's thread pool.
pub trait PersistenceAdapter: Sync {
    /// Fetch every image record belonging to `owner_id`.
    fn list_images(&self, owner_id: &str) -> Result<Vec<ImageRecord>, AdapterError>;

    /// Store one blob. Does not create a record; the store does that through
    /// [`save_images`](Self::save_images) once it has assigned an order.
    fn upload_image(
        &self,
        file: &UploadFile,
        owner_id: &str,
        kind: ImageType,
    ) -> Result<StoredObject, AdapterError>;

    /// Delete the listed records (and their blobs, where unreferenced).
    fn delete_images(&self, owner_id: &str, ids: &[String]) -> Result<(), AdapterError>;

    /// Insert or replace the given records.
    fn save_images(&self, owner_id: &str, records: &[ImageRecord]) -> Result<(), AdapterError>;
}

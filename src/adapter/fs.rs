//! Local-directory persistence backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/
//! ├── index.json                       # every owner's records
//! ├── banner/<owner>/<hash>.<ext>      # blobs, content-addressed
//! └── gallery/<owner>/<hash>.<ext>
//! ```
//!
//! Blob names are the first 16 hex digits of the SHA-256 of their bytes, so
//! uploading the same file twice stores it once. Each upload still gets its
//! own record id (a v4 UUID), and a blob is deleted only when no record of
//! any owner references it anymore.
//!
//! A missing `index.json` is an empty gallery. A corrupt or newer-version
//! index is an error rather than silently empty, since writing over it would
//! lose every record.

use super::{AdapterError, PersistenceAdapter, StoredObject};
use crate::types::{ImageRecord, ImageType};
use crate::upload::UploadFile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const INDEX_FILENAME: &str = "index.json";

/// Bump when the index layout changes incompatibly.
const INDEX_VERSION: u32 = 1;

/// Hex digits of the content hash used in blob names.
const HASH_PREFIX_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GalleryIndex {
    version: u32,
    owners: BTreeMap<String, Vec<ImageRecord>>,
}

impl GalleryIndex {
    fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            owners: BTreeMap::new(),
        }
    }

    fn references(&self, storage_path: &str) -> bool {
        self.owners
            .values()
            .flatten()
            .any(|record| record.storage_path.as_deref() == Some(storage_path))
    }
}

/// Stores blobs and records under one directory.
#[derive(Debug)]
pub struct FsAdapter {
    root: PathBuf,
    base_url: Option<String>,
    /// Serializes read-modify-write cycles of `index.json`.
    index_lock: Mutex<()>,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
            index_lock: Mutex::new(()),
        }
    }

    /// Serve blobs from `base_url` instead of `file://` URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a record's blob.
    pub fn blob_path(&self, record: &ImageRecord) -> Result<PathBuf, AdapterError> {
        let storage_path = record
            .storage_path
            .as_deref()
            .ok_or_else(|| AdapterError::NotFound(record.id.clone()))?;
        Ok(self.root.join(storage_path))
    }

    /// Read a record's blob back.
    pub fn read_blob(&self, record: &ImageRecord) -> Result<Vec<u8>, AdapterError> {
        let path = self.blob_path(record)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AdapterError::NotFound(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, storage_path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), storage_path),
            None => format!("file://{}", self.root.join(storage_path).display()),
        }
    }

    fn load_index(&self) -> Result<GalleryIndex, AdapterError> {
        let path = self.root.join(INDEX_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GalleryIndex::empty()),
            Err(e) => return Err(e.into()),
        };
        let index: GalleryIndex = serde_json::from_str(&content)?;
        if index.version != INDEX_VERSION {
            return Err(AdapterError::Transport(format!(
                "unsupported index version {} (expected {INDEX_VERSION})",
                index.version
            )));
        }
        Ok(index)
    }

    /// Write through a temp file so a crash never leaves a torn index.
    fn save_index(&self, index: &GalleryIndex) -> Result<(), AdapterError> {
        std::fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(index)?;
        let tmp = self.root.join(format!("{INDEX_FILENAME}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, self.root.join(INDEX_FILENAME))?;
        Ok(())
    }

    /// Run `f` on the index under the lock, saving it afterwards.
    fn update_index<T>(
        &self,
        f: impl FnOnce(&mut GalleryIndex) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let _guard = self.index_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut index = self.load_index()?;
        let out = f(&mut index)?;
        self.save_index(&index)?;
        Ok(out)
    }
}

/// Owner ids become path segments; keep them to one.
fn check_owner(owner_id: &str) -> Result<(), AdapterError> {
    if owner_id.is_empty()
        || owner_id == "."
        || owner_id == ".."
        || owner_id.contains(['/', '\\'])
    {
        return Err(AdapterError::Transport(format!("invalid owner id '{owner_id}'")));
    }
    Ok(())
}

/// First [`HASH_PREFIX_LEN`] hex digits of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..HASH_PREFIX_LEN].to_string()
}

impl PersistenceAdapter for FsAdapter {
    fn list_images(&self, owner_id: &str) -> Result<Vec<ImageRecord>, AdapterError> {
        check_owner(owner_id)?;
        let _guard = self.index_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut index = self.load_index()?;
        Ok(index.owners.remove(owner_id).unwrap_or_default())
    }

    fn upload_image(
        &self,
        file: &UploadFile,
        owner_id: &str,
        kind: ImageType,
    ) -> Result<StoredObject, AdapterError> {
        check_owner(owner_id)?;
        let storage_path = format!(
            "{kind}/{owner_id}/{}.{}",
            content_hash(&file.bytes),
            file.extension()
        );
        let target = self.root.join(&storage_path);
        if target.exists() {
            debug!(path = %storage_path, "blob already stored");
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &file.bytes)?;
            debug!(path = %storage_path, bytes = file.bytes.len(), "stored blob");
        }
        Ok(StoredObject {
            id: Uuid::new_v4().to_string(),
            url: self.url_for(&storage_path),
            path: storage_path,
        })
    }

    fn delete_images(&self, owner_id: &str, ids: &[String]) -> Result<(), AdapterError> {
        check_owner(owner_id)?;
        let orphans = self.update_index(|index| {
            let records = index.owners.entry(owner_id.to_string()).or_default();
            if let Some(missing) = ids.iter().find(|id| !records.iter().any(|r| &r.id == *id)) {
                return Err(AdapterError::NotFound(missing.clone()));
            }
            let mut removed_paths = Vec::new();
            records.retain(|record| {
                if ids.contains(&record.id) {
                    removed_paths.extend(record.storage_path.clone());
                    false
                } else {
                    true
                }
            });
            removed_paths.retain(|path| !index.references(path));
            removed_paths.sort();
            removed_paths.dedup();
            Ok(removed_paths)
        })?;

        for path in orphans {
            match std::fs::remove_file(self.root.join(&path)) {
                Ok(()) => debug!(path = %path, "removed blob"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path, error = %e, "failed to remove blob"),
            }
        }
        Ok(())
    }

    fn save_images(&self, owner_id: &str, records: &[ImageRecord]) -> Result<(), AdapterError> {
        check_owner(owner_id)?;
        self.update_index(|index| {
            let stored = index.owners.entry(owner_id.to_string()).or_default();
            for record in records {
                match stored.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record.clone(),
                    None => stored.push(record.clone()),
                }
            }
            Ok(())
        })
    }
}

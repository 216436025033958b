//! The image record store.
//!
//! [`ImageStore`] owns the canonical, display-ordered list of one owner's
//! images and is the only writer of `display_order`. Every mutation follows
//! the same shape:
//!
//! 1. Validate against the current list (unknown ids, busy ids, capacity).
//! 2. Compute the next list with the pure [`ordering`](crate::ordering) rules.
//! 3. Persist the records that changed through the [`PersistenceAdapter`].
//! 4. Commit: swap in a new immutable snapshot and notify subscribers.
//!
//! A failure in steps 1 to 3 leaves the in-memory list untouched.
//!
//! ## Uploads
//!
//! Uploads run in two phases so the transport can happen off the store:
//! [`ImageStore::begin_upload`] validates and reserves a slot under a
//! temporary id, the caller sends the blob, and
//! [`ImageStore::complete_upload`] assigns the next order value and commits
//! the record. [`ImageStore::upload`] does all three for a batch, fanning the
//! transport out over rayon. Each item commits on its own, so a failed
//! sibling never discards a finished upload.

use crate::adapter::{AdapterError, PersistenceAdapter, StoredObject};
use crate::config::{GalleryConfig, UploadConfig};
use crate::ordering::{self, ReorderError};
use crate::types::{ImageDetails, ImageRecord, ImageType};
use crate::upload::{self, UploadFailure, UploadFile, UploadRejection, UploadReport};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to load images: {0}")]
    Load(#[source] AdapterError),
    #[error("{0}")]
    Transport(#[source] AdapterError),
    #[error("Unknown image: {0}")]
    UnknownImage(String),
    #[error("New order does not match the current images: {0}")]
    OrderMismatch(String),
    #[error("An operation is already in progress for image {0}")]
    Busy(String),
    #[error("Maximum of {max} images reached")]
    CapacityExceeded { max: usize },
    #[error("No images selected")]
    NothingSelected,
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error(transparent)]
    Rejected(#[from] UploadRejection),
    #[error("{}", partial_summary(.uploaded, .failed))]
    PartialUpload {
        uploaded: usize,
        failed: Vec<UploadFailure>,
    },
}

fn partial_summary(uploaded: &usize, failed: &[UploadFailure]) -> String {
    let list: Vec<String> = failed.iter().map(|f| f.to_string()).collect();
    format!(
        "{} of {} uploads failed: {}",
        failed.len(),
        uploaded + failed.len(),
        list.join("; ")
    )
}

/// Immutable view of the list handed to subscribers.
pub type Snapshot = Arc<Vec<ImageRecord>>;

pub type ListenerId = u64;

type Listener = Box<dyn Fn(&Snapshot) + Send>;

/// A validated upload holding a reserved slot until it is completed.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    temp_id: String,
    kind: ImageType,
    file: UploadFile,
}

impl PendingUpload {
    pub fn temp_id(&self) -> &str {
        &self.temp_id
    }

    pub fn kind(&self) -> ImageType {
        self.kind
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    /// Send the blob through `adapter`. Does not touch the store.
    pub fn send<A: PersistenceAdapter>(
        &self,
        adapter: &A,
        owner_id: &str,
    ) -> Result<StoredObject, AdapterError> {
        adapter.upload_image(&self.file, owner_id, self.kind)
    }
}

/// The canonical image list of one owner.
pub struct ImageStore<A: PersistenceAdapter> {
    adapter: A,
    owner_id: String,
    images: Snapshot,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
    /// Ids with an outstanding per-record operation.
    in_flight: HashSet<String>,
    /// Temporary ids of reserved upload slots.
    pending: HashSet<String>,
    next_temp: u64,
    uploads: UploadConfig,
    max_images: usize,
}

impl<A: PersistenceAdapter> ImageStore<A> {
    pub fn new(adapter: A, owner_id: impl Into<String>, config: &GalleryConfig) -> Self {
        Self {
            adapter,
            owner_id: owner_id.into(),
            images: Arc::new(Vec::new()),
            listeners: Vec::new(),
            next_listener: 0,
            in_flight: HashSet::new(),
            pending: HashSet::new(),
            next_temp: 0,
            uploads: config.uploads.clone(),
            max_images: config.gallery.max_images,
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Current list in display order.
    pub fn images(&self) -> &[ImageRecord] {
        self.images.as_slice()
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.images)
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|image| image.id == id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    /// Whether another upload fits, counting reserved slots.
    pub fn can_add_more(&self) -> bool {
        self.remaining_slots() > 0
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_images
            .saturating_sub(self.images.len() + self.pending.len())
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a listener called with every committed snapshot.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&Snapshot) + Send + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn commit(&mut self, mut images: Vec<ImageRecord>) {
        images.sort_by(ordering::display_cmp);
        self.images = Arc::new(images);
        debug!(owner = %self.owner_id, count = self.images.len(), "committed image list");
        for (_, listener) in &self.listeners {
            listener(&self.images);
        }
    }

    fn persist(&self, records: &[ImageRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        self.adapter
            .save_images(&self.owner_id, records)
            .map_err(|e| {
                warn!(owner = %self.owner_id, error = %e, "failed to save images");
                StoreError::Transport(e)
            })
    }

    // =========================================================================
    // Per-record operation guard
    // =========================================================================

    /// Mark `id` as having an outstanding operation.
    pub fn begin_operation(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.in_flight.insert(id.to_string()) {
            return Err(StoreError::Busy(id.to_string()));
        }
        Ok(())
    }

    pub fn end_operation(&mut self, id: &str) -> bool {
        self.in_flight.remove(id)
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    fn ensure_idle<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<(), StoreError> {
        match ids.into_iter().find(|id| self.in_flight.contains(*id)) {
            Some(id) => Err(StoreError::Busy(id.to_string())),
            None => Ok(()),
        }
    }

    fn require(&self, id: &str) -> Result<&ImageRecord, StoreError> {
        self.get(id)
            .ok_or_else(|| StoreError::UnknownImage(id.to_string()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replace the list with the owner's images from the adapter.
    ///
    /// On failure the previous list stays in place.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        match self.adapter.list_images(&self.owner_id) {
            Ok(images) => {
                let count = images.len();
                self.commit(images);
                Ok(count)
            }
            Err(e) => {
                warn!(owner = %self.owner_id, error = %e, "failed to load images");
                Err(StoreError::Load(e))
            }
        }
    }

    /// Atomically apply the order of `new_list`.
    ///
    /// `new_list` must hold exactly the current ids. Only its order values are
    /// taken; every other field keeps its current value. The result is
    /// densified before it is persisted. Returns whether anything changed.
    pub fn replace_order(&mut self, new_list: Vec<ImageRecord>) -> Result<bool, StoreError> {
        let current = self.images.len();
        if new_list.len() != current {
            return Err(StoreError::OrderMismatch(format!(
                "expected {current} images, got {}",
                new_list.len()
            )));
        }
        let mut orders: HashMap<&str, u32> = HashMap::with_capacity(current);
        for image in &new_list {
            if orders.insert(&image.id, image.display_order).is_some() {
                return Err(StoreError::OrderMismatch(format!(
                    "duplicate image {}",
                    image.id
                )));
            }
        }

        let mut updated = Vec::with_capacity(current);
        for image in self.images.iter() {
            let order = orders
                .get(image.id.as_str())
                .copied()
                .ok_or_else(|| StoreError::OrderMismatch(format!("missing image {}", image.id)))?;
            let mut image = image.clone();
            image.display_order = order;
            updated.push(image);
        }
        let (dense, _) = ordering::densify(&updated);

        let changed = changed_records(&self.images, &dense);
        if changed.is_empty() {
            return Ok(false);
        }
        self.ensure_idle(changed.iter().map(|image| image.id.as_str()))?;
        self.persist(&changed)?;
        debug!(changed = changed.len(), "reordered images");
        self.commit(dense);
        Ok(true)
    }

    /// Drag the item at `from` to `to` in the flattened display list.
    pub fn move_image(&mut self, from: usize, to: usize) -> Result<bool, StoreError> {
        match ordering::move_image(&self.images, from, to)? {
            Some(moved) => self.replace_order(moved),
            None => Ok(false),
        }
    }

    /// Delete images, then close the gaps they leave.
    ///
    /// Every id must exist. If persisting the renumbered survivors fails, the
    /// delete still stands locally (it already happened in the backend) and
    /// the error is returned. The list is then NOT dense: callers must follow
    /// that error with [`densify`](Self::densify) to close the gaps.
    pub fn remove(&mut self, ids: &[String]) -> Result<usize, StoreError> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        for id in &doomed {
            self.require(id)?;
        }
        self.ensure_idle(doomed.iter().copied())?;

        let doomed_ids: Vec<String> = doomed.iter().map(|id| id.to_string()).collect();
        self.adapter
            .delete_images(&self.owner_id, &doomed_ids)
            .map_err(|e| {
                warn!(owner = %self.owner_id, error = %e, "failed to delete images");
                StoreError::Transport(e)
            })?;

        let remaining: Vec<ImageRecord> = self
            .images
            .iter()
            .filter(|image| !doomed.contains(image.id.as_str()))
            .cloned()
            .collect();
        let removed = self.images.len() - remaining.len();
        let (dense, _) = ordering::densify(&remaining);
        let changed = changed_records(&remaining, &dense);
        if let Err(e) = self.persist(&changed) {
            self.commit(remaining);
            return Err(e);
        }
        debug!(removed, renumbered = changed.len(), "removed images");
        self.commit(dense);
        Ok(removed)
    }

    /// Make `id` a banner. Its order value is kept as is.
    pub fn set_banner(&mut self, id: &str) -> Result<bool, StoreError> {
        self.set_type(id, ImageType::Banner)
    }

    /// Make `id` a gallery image. Its order value is kept as is.
    pub fn unset_banner(&mut self, id: &str) -> Result<bool, StoreError> {
        self.set_type(id, ImageType::Gallery)
    }

    fn set_type(&mut self, id: &str, image_type: ImageType) -> Result<bool, StoreError> {
        let image = self.require(id)?;
        if image.image_type == image_type {
            return Ok(false);
        }
        self.ensure_idle([id])?;
        let mut updated = image.clone();
        updated.image_type = image_type;
        self.persist(std::slice::from_ref(&updated))?;
        debug!(id, %image_type, "changed image type");
        self.replace_record(updated);
        Ok(true)
    }

    /// Renumber every partition to `0..n-1`. Returns whether anything changed.
    pub fn densify(&mut self) -> Result<bool, StoreError> {
        let (dense, changed) = ordering::densify(&self.images);
        if !changed {
            return Ok(false);
        }
        let records = changed_records(&self.images, &dense);
        self.ensure_idle(records.iter().map(|image| image.id.as_str()))?;
        self.persist(&records)?;
        self.commit(dense);
        Ok(true)
    }

    /// Save alt text and caption of one image.
    pub fn update_details(&mut self, id: &str, details: ImageDetails) -> Result<(), StoreError> {
        let image = self.require(id)?;
        self.ensure_idle([id])?;
        let details = ImageDetails::new(details.alt_text, details.caption);
        let mut updated = image.clone();
        updated.alt_text = details.alt_text;
        updated.caption = details.caption;
        self.persist(std::slice::from_ref(&updated))?;
        self.replace_record(updated);
        Ok(())
    }

    fn replace_record(&mut self, record: ImageRecord) {
        let images = self
            .images
            .iter()
            .map(|image| {
                if image.id == record.id {
                    record.clone()
                } else {
                    image.clone()
                }
            })
            .collect();
        self.commit(images);
    }

    // =========================================================================
    // Uploads
    // =========================================================================

    /// Validate `file` and reserve a slot for it.
    pub fn begin_upload(
        &mut self,
        file: UploadFile,
        kind: ImageType,
    ) -> Result<PendingUpload, StoreError> {
        upload::validate(&file, &self.uploads)?;
        if !self.can_add_more() {
            return Err(StoreError::CapacityExceeded {
                max: self.max_images,
            });
        }
        let temp_id = format!("pending-{}", self.next_temp);
        self.next_temp += 1;
        self.pending.insert(temp_id.clone());
        Ok(PendingUpload {
            temp_id,
            kind,
            file,
        })
    }

    /// Commit (or release) a reserved upload slot.
    ///
    /// The new record is appended to its partition with the next order value
    /// at completion time, then saved through the adapter.
    pub fn complete_upload(
        &mut self,
        pending: PendingUpload,
        outcome: Result<StoredObject, AdapterError>,
    ) -> Result<ImageRecord, StoreError> {
        if !self.pending.remove(&pending.temp_id) {
            return Err(StoreError::UnknownImage(pending.temp_id));
        }
        let stored = outcome.map_err(|e| {
            warn!(file = %pending.file.name, error = %e, "upload failed");
            StoreError::Transport(e)
        })?;

        let record = ImageRecord {
            id: stored.id,
            url: stored.url,
            alt_text: None,
            caption: None,
            display_order: ordering::next_display_order(&self.images, pending.kind),
            image_type: pending.kind,
            storage_path: Some(stored.path),
            file_size: Some(pending.file.size()),
            mime_type: Some(pending.file.mime_type.clone()),
        };
        if let Err(e) = self.persist(std::slice::from_ref(&record)) {
            warn!(
                path = record.storage_path.as_deref().unwrap_or_default(),
                "uploaded blob has no record"
            );
            return Err(e);
        }
        debug!(id = %record.id, order = record.display_order, "upload committed");
        let mut images = self.images.to_vec();
        images.push(record.clone());
        self.commit(images);
        Ok(record)
    }

    /// Complete an upload against a store that may have been dropped.
    ///
    /// Returns `None` when the store is gone; the result is discarded.
    pub fn complete_detached(
        store: &Weak<Mutex<Self>>,
        pending: PendingUpload,
        outcome: Result<StoredObject, AdapterError>,
    ) -> Option<Result<ImageRecord, StoreError>> {
        let Some(store) = store.upgrade() else {
            debug!(temp_id = %pending.temp_id, "store dropped, discarding upload result");
            return None;
        };
        let mut guard = match store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(guard.complete_upload(pending, outcome))
    }

    /// Upload a batch. Valid files are sent in parallel; every item commits or
    /// fails on its own.
    pub fn upload(&mut self, files: Vec<UploadFile>, kind: ImageType) -> UploadReport {
        let mut report = UploadReport::default();
        let mut queued = Vec::with_capacity(files.len());
        for (index, file) in files.into_iter().enumerate() {
            let name = file.name.clone();
            match self.begin_upload(file, kind) {
                Ok(pending) => queued.push((index, pending)),
                Err(e) => report.failed.push(UploadFailure {
                    index,
                    name,
                    reason: e.to_string(),
                }),
            }
        }

        let adapter = &self.adapter;
        let owner_id = self.owner_id.as_str();
        let outcomes: Vec<Result<StoredObject, AdapterError>> = queued
            .par_iter()
            .map(|(_, pending)| pending.send(adapter, owner_id))
            .collect();

        for ((index, pending), outcome) in queued.into_iter().zip(outcomes) {
            let name = pending.file.name.clone();
            match self.complete_upload(pending, outcome) {
                Ok(record) => report.uploaded.push(record),
                Err(e) => report.failed.push(UploadFailure {
                    index,
                    name,
                    reason: e.to_string(),
                }),
            }
        }
        report.failed.sort_by_key(|failure| failure.index);
        debug!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "upload batch finished"
        );
        report
    }
}

/// Records of `next` that differ from their namesake in `previous`.
fn changed_records(previous: &[ImageRecord], next: &[ImageRecord]) -> Vec<ImageRecord> {
    let previous: HashMap<&str, &ImageRecord> = previous
        .iter()
        .map(|image| (image.id.as_str(), image))
        .collect();
    next.iter()
        .filter(|image| previous.get(image.id.as_str()) != Some(image))
        .cloned()
        .collect()
}

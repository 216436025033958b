//! Bulk selection of gallery images.
//!
//! [`SelectionSet`] is a plain value: it never touches the store except in
//! [`SelectionSet::bulk_delete`], which hands the selected ids to
//! [`ImageStore::remove`] and clears itself only when the delete commits.

use crate::adapter::PersistenceAdapter;
use crate::store::{ImageStore, StoreError};
use std::collections::BTreeSet;

/// Ids currently marked for a bulk action. Iterates in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark or unmark one id. Idempotent; returns whether the set changed.
    pub fn toggle(&mut self, id: &str, selected: bool) -> bool {
        if selected {
            self.selected.insert(id.to_string())
        } else {
            self.selected.remove(id)
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Whether every one of `total` images is selected.
    pub fn all_selected(&self, total: usize) -> bool {
        total > 0 && self.selected.len() == total
    }

    /// Select every id in `all_ids`. A no-op when they are all selected already.
    pub fn select_all<'a>(&mut self, all_ids: impl IntoIterator<Item = &'a str>) {
        for id in all_ids {
            if !self.selected.contains(id) {
                self.selected.insert(id.to_string());
            }
        }
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// The "select all" control: deselects everything once the selection
    /// already covers all `all_ids`, otherwise selects them all.
    pub fn toggle_all<'a>(&mut self, all_ids: impl IntoIterator<Item = &'a str>) {
        let all: Vec<&str> = all_ids.into_iter().collect();
        if self.all_selected(all.len()) {
            self.deselect_all();
        } else {
            self.selected = all.into_iter().map(str::to_string).collect();
        }
    }

    /// Drop ids that are no longer present, e.g. after a reload.
    pub fn retain_existing<'a>(&mut self, existing: impl IntoIterator<Item = &'a str>) {
        let existing: BTreeSet<&str> = existing.into_iter().collect();
        self.selected.retain(|id| existing.contains(id.as_str()));
    }

    /// Delete every selected image through the store.
    ///
    /// Requires a non-empty selection. The selection is cleared only when the
    /// store commits the delete; on failure it is kept so the user can retry.
    pub fn bulk_delete<A: PersistenceAdapter>(
        &mut self,
        store: &mut ImageStore<A>,
    ) -> Result<usize, StoreError> {
        if self.selected.is_empty() {
            return Err(StoreError::NothingSelected);
        }
        let ids: Vec<String> = self.selected.iter().cloned().collect();
        let removed = store.remove(&ids)?;
        self.selected.clear();
        Ok(removed)
    }
}

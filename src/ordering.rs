//! Display ordering rules: sort, drag-reorder, and densify.
//!
//! All functions here are pure. The store applies their results as a single
//! atomic commit; nothing in this module mutates shared state.
//!
//! ## The flattened view
//!
//! Reorder gestures address positions in the *flattened* list that the
//! gallery manager shows: every banner first, then every gallery image, each
//! group by `display_order` ascending. [`sort_for_display`] produces exactly
//! that list.
//!
//! ## Renumbering
//!
//! `display_order` is scoped to an [`ImageType`] partition. After a move, each
//! record gets its index among records *of the same type* in the new
//! flattened order, so both partitions stay `0..n-1`. A banner dragged below
//! gallery images therefore keeps being a banner and snaps back to the end of
//! the banner block on the next sort; changing type is an explicit
//! `set_banner`/`unset_banner` call.

use crate::types::{ImageRecord, ImageType};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Index {index} is out of range for {len} images")]
    OutOfRange { index: usize, len: usize },
}

/// Display comparator: banners first, then `display_order` ascending.
pub fn display_cmp(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    a.image_type
        .rank()
        .cmp(&b.image_type.rank())
        .then(a.display_order.cmp(&b.display_order))
}

/// Return a copy of `images` in display order. Stable for equal keys.
pub fn sort_for_display(images: &[ImageRecord]) -> Vec<ImageRecord> {
    let mut sorted = images.to_vec();
    sorted.sort_by(display_cmp);
    sorted
}

/// Move the item at `from` to `to` within an already-sorted list.
///
/// Returns `Ok(None)` when `from == to` (nothing to commit). Otherwise the
/// returned list is in the new flattened order with every partition
/// renumbered densely.
pub fn move_image(
    sorted: &[ImageRecord],
    from: usize,
    to: usize,
) -> Result<Option<Vec<ImageRecord>>, ReorderError> {
    let len = sorted.len();
    for index in [from, to] {
        if index >= len {
            return Err(ReorderError::OutOfRange { index, len });
        }
    }
    if from == to {
        return Ok(None);
    }

    let mut moved = sorted.to_vec();
    let item = moved.remove(from);
    moved.insert(to, item);
    renumber_in_place(&mut moved);
    Ok(Some(moved))
}

/// Renumber every partition by list position, keeping list order.
fn renumber_in_place(images: &mut [ImageRecord]) {
    let mut banners = 0u32;
    let mut gallery = 0u32;
    for image in images.iter_mut() {
        let counter = match image.image_type {
            ImageType::Banner => &mut banners,
            ImageType::Gallery => &mut gallery,
        };
        image.display_order = *counter;
        *counter += 1;
    }
}

/// Close gaps and resolve duplicates in `display_order`, per partition.
///
/// Relative order within each partition is preserved (ties keep their list
/// order). Returns the densified list in display order and whether any
/// record actually changed.
pub fn densify(images: &[ImageRecord]) -> (Vec<ImageRecord>, bool) {
    let mut sorted = sort_for_display(images);
    let before: Vec<u32> = sorted.iter().map(|i| i.display_order).collect();
    renumber_in_place(&mut sorted);
    let changed = sorted
        .iter()
        .zip(&before)
        .any(|(image, old)| image.display_order != *old);
    (sorted, changed)
}

/// Whether every partition is numbered exactly `0..n-1`.
pub fn is_dense(images: &[ImageRecord]) -> bool {
    let sorted = sort_for_display(images);
    let mut expected = [0u32; 2];
    sorted.iter().all(|image| {
        let slot = &mut expected[image.image_type.rank() as usize];
        let ok = image.display_order == *slot;
        *slot += 1;
        ok
    })
}

/// Order value for a new record appended to the `image_type` partition.
pub fn next_display_order(images: &[ImageRecord], image_type: ImageType) -> u32 {
    images
        .iter()
        .filter(|i| i.image_type == image_type)
        .map(|i| i.display_order + 1)
        .max()
        .unwrap_or(0)
}

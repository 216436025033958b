//! # Gallery Kit
//!
//! Image gallery management for admin tooling: an ordered set of images per
//! owner (a project, a portfolio), split into banners and gallery images,
//! with drag reordering, bulk deletion, batch uploads, and an interactive
//! cropper that turns a selection over a scaled preview into a
//! full-resolution JPEG.
//!
//! # Architecture: Store, Controllers, Adapter
//!
//! ```text
//!  SelectionSet ─┐                       ┌─ FsAdapter (local dir)
//!  ordering ─────┼─▶ ImageStore ─trait─▶ PersistenceAdapter
//!  CropSession ──┘   (canonical list,    └─ anything else
//!                     subscribers)
//! ```
//!
//! The store is the single owner of the list and the only writer of
//! `display_order`. Controllers compute on read copies and submit whole-list
//! or id-list changes; the store validates, persists, and then publishes a
//! new immutable snapshot to its subscribers. A crop session never touches
//! the store: its product is a [`crop::CropOutput`] the caller uploads.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `ImageRecord`, `ImageType`, `ImageDetails` |
//! | [`ordering`] | Pure display sort, drag-reorder splice, densify |
//! | [`selection`] | Bulk selection set and bulk delete |
//! | [`crop`] | Crop session state machine, coordinate math, raster ops |
//! | [`upload`] | Upload inputs, validation, batch report |
//! | [`store`] | `ImageStore`: canonical list, commits, observers, uploads |
//! | [`adapter`] | `PersistenceAdapter` trait and the local `FsAdapter` |
//! | [`config`] | `config.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Per-Type Dense Ordering
//!
//! `display_order` is scoped to the image type. Reorders address positions
//! in the flattened banners-then-gallery list, and every record is then
//! renumbered by its index among records of the same type. Both partitions
//! are always `0..n-1` after a reorder, a delete, or [`store::ImageStore::densify`].
//! Changing type (`set_banner`) deliberately does not renumber.
//!
//! ## Independent Upload Commits
//!
//! A batch upload validates every file first, sends the valid ones in
//! parallel, and commits each success on its own. One failed file never
//! discards the others; the [`upload::UploadReport`] names exactly what to
//! retry.
//!
//! ## Per-Axis Crop Scaling
//!
//! The preview is rarely drawn at the source's aspect ratio, so display
//! rectangles are scaled by `natural / rendered` separately on each axis.
//! Crops are always cut from natural pixels.

pub mod adapter;
pub mod config;
pub mod crop;
pub mod ordering;
pub mod output;
pub mod selection;
pub mod store;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;

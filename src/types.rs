//! Shared types used by the store, the controllers, and the persistence layer.
//!
//! These types are serialized to JSON by [`FsAdapter`](crate::adapter::fs::FsAdapter)
//! and must stay stable across releases: field names are the on-disk contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an image within its owner's gallery.
///
/// Banners are the primary display asset and always sort ahead of gallery
/// images. Nothing enforces a single banner; presentation layers decide how
/// many to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Banner,
    #[default]
    Gallery,
}

impl ImageType {
    /// Sort rank: banners first.
    pub fn rank(self) -> u8 {
        match self {
            ImageType::Banner => 0,
            ImageType::Gallery => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Banner => "banner",
            ImageType::Gallery => "gallery",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "banner" => Ok(ImageType::Banner),
            "gallery" => Ok(ImageType::Gallery),
            other => Err(format!("unknown image type '{other}' (expected banner or gallery)")),
        }
    }
}

/// One image attached to an owning entity (project, portfolio, ...).
///
/// `display_order` positions the record among images of the same
/// [`ImageType`]. The store renumbers it densely (`0..n-1` per type) after
/// every reorder, delete, and explicit densify pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub display_order: u32,
    pub image_type: ImageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Editable display text of an image (the "Edit Image" form).
///
/// `None` clears the field; empty strings are normalized to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub alt_text: Option<String>,
    pub caption: Option<String>,
}

impl ImageDetails {
    pub fn new(alt_text: Option<String>, caption: Option<String>) -> Self {
        Self {
            alt_text: alt_text.filter(|s| !s.trim().is_empty()),
            caption: caption.filter(|s| !s.trim().is_empty()),
        }
    }
}

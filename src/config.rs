//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [crop]
//! min_width = 400           # Smallest source image the cropper accepts
//! min_height = 300
//! default_preset = "banner" # Preset selected when a crop session opens
//! jpeg_quality = 90         # Quality of the cropped JPEG (1-100)
//!
//! [[crop.presets]]
//! name = "banner"
//! ratio = [16, 9]           # Omit `ratio` for a free-form preset
//! description = "Banner (16:9)"
//!
//! [uploads]
//! max_file_size = 5242880   # Bytes (5 MiB)
//! allowed_types = ["image/jpeg", "image/jpg", "image/png", "image/webp"]
//! max_width = 1920          # Bounds for --optimize before upload
//! max_height = 1080
//! quality = 90
//!
//! [gallery]
//! max_images = 20           # Per owner
//! ```
//!
//! Unknown keys are rejected to catch typos early. Arrays (such as
//! `crop.presets`) replace the stock value wholesale rather than merging.

use crate::types::ImageType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Crop session settings (minimum source size, presets, output quality).
    pub crop: CropConfig,
    /// Upload validation and pre-upload optimization settings.
    pub uploads: UploadConfig,
    /// Per-owner gallery limits.
    pub gallery: GalleryLimits,
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.crop.jpeg_quality) {
            return Err(ConfigError::Validation(
                "crop.jpeg_quality must be 1-100".into(),
            ));
        }
        if !(1..=100).contains(&self.uploads.quality) {
            return Err(ConfigError::Validation(
                "uploads.quality must be 1-100".into(),
            ));
        }
        if self.crop.min_width == 0 || self.crop.min_height == 0 {
            return Err(ConfigError::Validation(
                "crop.min_width and crop.min_height must be non-zero".into(),
            ));
        }
        if self.crop.presets.is_empty() {
            return Err(ConfigError::Validation(
                "crop.presets must not be empty".into(),
            ));
        }
        for preset in &self.crop.presets {
            if matches!(preset.ratio, Some([w, h]) if w == 0 || h == 0) {
                return Err(ConfigError::Validation(format!(
                    "crop.presets.{}: ratio values must be non-zero",
                    preset.name
                )));
            }
        }
        if self.crop.preset(&self.crop.default_preset).is_none() {
            return Err(ConfigError::Validation(format!(
                "crop.default_preset '{}' is not one of crop.presets",
                self.crop.default_preset
            )));
        }
        if self.uploads.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "uploads.allowed_types must not be empty".into(),
            ));
        }
        if self.uploads.max_width == 0 || self.uploads.max_height == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_width and uploads.max_height must be non-zero".into(),
            ));
        }
        if self.gallery.max_images == 0 {
            return Err(ConfigError::Validation(
                "gallery.max_images must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A named aspect-ratio choice offered by the cropper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectPreset {
    pub name: String,
    /// `[width, height]`; absent for free form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<[u32; 2]>,
    pub description: String,
}

impl AspectPreset {
    pub fn new(name: &str, ratio: Option<[u32; 2]>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ratio,
            description: description.to_string(),
        }
    }

    /// Width / height, or `0.0` for free form.
    pub fn value(&self) -> f64 {
        match self.ratio {
            Some([w, h]) if w > 0 && h > 0 => w as f64 / h as f64,
            _ => 0.0,
        }
    }

    pub fn is_free_form(&self) -> bool {
        self.value() == 0.0
    }
}

/// Crop session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Smallest natural width a source image may have.
    pub min_width: u32,
    /// Smallest natural height a source image may have.
    pub min_height: u32,
    /// Name of the preset selected when a session opens.
    pub default_preset: String,
    /// JPEG quality of the cropped output.
    pub jpeg_quality: u8,
    pub presets: Vec<AspectPreset>,
}

impl CropConfig {
    pub fn preset(&self, name: &str) -> Option<&AspectPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Preset the gallery opens the cropper with for a given image type.
    ///
    /// Falls back to `default_preset` when the type's namesake preset has
    /// been removed from the config.
    pub fn preset_for(&self, image_type: ImageType) -> &str {
        let name = image_type.as_str();
        match self.preset(name) {
            Some(p) => &p.name,
            None => &self.default_preset,
        }
    }
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            min_width: 400,
            min_height: 300,
            default_preset: "banner".to_string(),
            jpeg_quality: 90,
            presets: vec![
                AspectPreset::new("banner", Some([16, 9]), "Banner (16:9)"),
                AspectPreset::new("gallery", Some([4, 3]), "Gallery (4:3)"),
                AspectPreset::new("square", Some([1, 1]), "Square (1:1)"),
                AspectPreset::new("portrait", Some([3, 4]), "Portrait (3:4)"),
                AspectPreset::new("free", None, "Free form"),
            ],
        }
    }
}

/// Upload validation and optimization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
    /// Accepted MIME types (compared case-insensitively).
    pub allowed_types: Vec<String>,
    /// Bounding box for optimize-before-upload.
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality for optimized uploads.
    pub quality: u8,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            allowed_types: ["image/jpeg", "image/jpg", "image/png", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_width: 1920,
            max_height: 1080,
            quality: 90,
        }
    }
}

/// Per-owner gallery limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryLimits {
    /// Maximum number of images one owner may have.
    pub max_images: usize,
}

impl Default for GalleryLimits {
    fn default() -> Self {
        Self { max_images: 20 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(GalleryConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<GalleryConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gallery-kit configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Crop sessions
# ---------------------------------------------------------------------------
[crop]
# Source images smaller than this are rejected.
min_width = 400
min_height = 300

# Preset selected when a crop session opens.
default_preset = "banner"

# JPEG quality of the cropped output (1-100).
jpeg_quality = 90

# Aspect-ratio presets. Omit `ratio` for free form.
# Listing presets replaces the whole default list.
[[crop.presets]]
name = "banner"
ratio = [16, 9]
description = "Banner (16:9)"

[[crop.presets]]
name = "gallery"
ratio = [4, 3]
description = "Gallery (4:3)"

[[crop.presets]]
name = "square"
ratio = [1, 1]
description = "Square (1:1)"

[[crop.presets]]
name = "portrait"
ratio = [3, 4]
description = "Portrait (3:4)"

[[crop.presets]]
name = "free"
description = "Free form"

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[uploads]
# Largest accepted file in bytes (5 MiB).
max_file_size = 5242880

# Accepted MIME types.
allowed_types = ["image/jpeg", "image/jpg", "image/png", "image/webp"]

# `upload --optimize` scales images down to fit this box and re-encodes as JPEG.
max_width = 1920
max_height = 1080
quality = 90

# ---------------------------------------------------------------------------
# Gallery limits
# ---------------------------------------------------------------------------
[gallery]
# Maximum number of images per owner.
max_images = 20
"##
}

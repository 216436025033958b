//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Gallery listing
//!
//! ```text
//! Banners
//! 001 hero (order 0)
//!     Alt: Front entrance at dusk
//!     Source: banner/p1/3f2a9c0d1e4b5a6c.jpg (512.0 KB, image/jpeg)
//!
//! Gallery
//! 001 lobby (order 0)
//!     Source: gallery/p1/9e8d7c6b5a493827.jpg
//! 002 atrium (order 1)
//!     Caption: Second floor
//!
//! 3 of 20 images
//! ```
//!
//! ## Upload
//!
//! ```text
//! Uploaded 2 of 3 files
//!     001 1.jpg → gallery order 0
//!     003 3.jpg → gallery order 1
//! Failed
//!     #2 2.jpg: Transport failed: connection reset
//! ```
//!
//! ## Crop
//!
//! ```text
//! Cropped 640x360 at 80,120 (Banner (16:9))
//!     → hero-cropped.jpg
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::config::AspectPreset;
use crate::crop::PixelRect;
use crate::types::{ImageRecord, ImageType};
use crate::upload::{UploadReport, format_size};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn source_line(image: &ImageRecord) -> Option<String> {
    let path = image.storage_path.as_deref()?;
    let details: Vec<String> = image
        .file_size
        .map(format_size)
        .into_iter()
        .chain(image.mime_type.clone())
        .collect();
    Some(if details.is_empty() {
        format!("{}Source: {}", indent(1), path)
    } else {
        format!("{}Source: {} ({})", indent(1), path, details.join(", "))
    })
}

fn partition_lines(title: &str, images: &[&ImageRecord]) -> Vec<String> {
    let mut lines = vec![title.to_string()];
    for (i, image) in images.iter().enumerate() {
        lines.push(format!(
            "{} {} (order {})",
            format_index(i + 1),
            image.id,
            image.display_order
        ));
        if let Some(alt) = &image.alt_text {
            lines.push(format!("{}Alt: {}", indent(1), alt));
        }
        if let Some(caption) = &image.caption {
            lines.push(format!("{}Caption: {}", indent(1), caption));
        }
        lines.extend(source_line(image));
    }
    lines
}

/// List an owner's images, banners first. `images` must be in display order.
pub fn format_gallery(images: &[ImageRecord], max_images: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for (kind, title) in [(ImageType::Banner, "Banners"), (ImageType::Gallery, "Gallery")] {
        let group: Vec<&ImageRecord> = images.iter().filter(|i| i.image_type == kind).collect();
        if group.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(partition_lines(title, &group));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("{} of {} images", images.len(), max_images));
    lines
}

pub fn print_gallery(images: &[ImageRecord], max_images: usize) {
    for line in format_gallery(images, max_images) {
        println!("{}", line);
    }
}

/// Summarize an upload batch. `total` is the number of submitted files.
pub fn format_upload_report(report: &UploadReport, total: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "Uploaded {} of {} files",
        report.uploaded.len(),
        total
    )];
    for (i, record) in report.uploaded.iter().enumerate() {
        lines.push(format!(
            "{}{} {} → {} order {}",
            indent(1),
            format_index(i + 1),
            record.id,
            record.image_type,
            record.display_order
        ));
    }
    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for failure in &report.failed {
            lines.push(format!("{}{}", indent(1), failure));
        }
    }
    lines
}

pub fn print_upload_report(report: &UploadReport, total: usize) {
    for line in format_upload_report(report, total) {
        println!("{}", line);
    }
}

pub fn format_crop(rect: PixelRect, preset: &AspectPreset, out: &Path) -> Vec<String> {
    vec![
        format!(
            "Cropped {}x{} at {},{} ({})",
            rect.width, rect.height, rect.x, rect.y, preset.description
        ),
        format!("{}→ {}", indent(1), out.display()),
    ]
}

pub fn print_crop(rect: PixelRect, preset: &AspectPreset, out: &Path) {
    for line in format_crop(rect, preset, out) {
        println!("{}", line);
    }
}

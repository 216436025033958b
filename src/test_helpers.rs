//! Shared test utilities for the gallery-kit test suite.
//!
//! Provides record builders, bulk extractors, and the density assertion used
//! by the ordering, selection, and store tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let images = vec![gallery("a", 0), gallery("b", 1), banner("hero", 0)];
//! let sorted = sort_for_display(&images);
//! assert_eq!(ids(&sorted), ["hero", "a", "b"]);
//! assert_dense(&sorted);
//! ```

use crate::types::{ImageRecord, ImageType};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::collections::BTreeMap;

// =========================================================================
// Record builders
// =========================================================================

/// A record with just enough fields filled in for ordering tests.
pub fn record(id: &str, image_type: ImageType, display_order: u32) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        url: format!("https://cdn.test/{id}.jpg"),
        alt_text: None,
        caption: None,
        display_order,
        image_type,
        storage_path: Some(format!("{image_type}/owner/{id}.jpg")),
        file_size: Some(1024),
        mime_type: Some("image/jpeg".to_string()),
    }
}

pub fn gallery(id: &str, display_order: u32) -> ImageRecord {
    record(id, ImageType::Gallery, display_order)
}

pub fn banner(id: &str, display_order: u32) -> ImageRecord {
    record(id, ImageType::Banner, display_order)
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// All ids in list order.
pub fn ids(images: &[ImageRecord]) -> Vec<&str> {
    images.iter().map(|i| i.id.as_str()).collect()
}

/// `(id, display_order)` pairs in list order.
pub fn id_orders(images: &[ImageRecord]) -> Vec<(&str, u32)> {
    images
        .iter()
        .map(|i| (i.id.as_str(), i.display_order))
        .collect()
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert every `image_type` partition is numbered exactly `0..n-1`.
pub fn assert_dense(images: &[ImageRecord]) {
    let mut partitions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
    for image in images {
        partitions
            .entry(image.image_type.as_str())
            .or_default()
            .push(image.display_order);
    }
    for (kind, mut orders) in partitions {
        orders.sort_unstable();
        let expected: Vec<u32> = (0..orders.len() as u32).collect();
        assert_eq!(orders, expected, "{kind} partition is not dense");
    }
}

// =========================================================================
// Raster fixtures
// =========================================================================

/// A gradient image so crops can be checked by pixel value.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// PNG-encoded gradient bytes.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

//! Interactive crop sessions.
//!
//! The module is split into:
//! - **Calculations**: pure coordinate math (percent, display, natural space)
//! - **Raster**: decode, crop, downscale, and JPEG encode via the `image` crate
//! - **Session**: the [`CropSession`] state machine tying both together
//!
//! A session never persists anything. Its only product is a [`CropOutput`]
//! that the caller uploads or writes wherever it likes.

pub mod calculations;
pub mod raster;
pub mod session;

pub use calculations::{PixelRect, Rect, Selection, SelectionUnit, Size};
pub use session::{CropJob, CropOutput, CropPhase, CropSession, RenderedCrop};

use thiserror::Error;

/// Errors raised by a crop session.
///
/// `Read`, `Decode` and `Dimension` are load failures: the session parks in
/// [`CropPhase::Failed`] and accepts a new source. The rest reject a single
/// action and leave the phase untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    /// The local file could not be read. Carries the underlying cause.
    #[error("Failed to read image file")]
    Read(String),
    /// The bytes could not be decoded as an image. Carries the underlying cause.
    #[error("Failed to load image")]
    Decode(String),
    #[error("Image is too small. Minimum dimensions: {min_width}x{min_height}px")]
    Dimension {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("Unknown aspect ratio preset: {0}")]
    UnknownPreset(String),
    #[error("No image loaded")]
    NoImage,
    #[error("No crop area selected")]
    NoSelection,
    #[error("Crop area is empty")]
    EmptyCrop,
    #[error("Rendered size must be non-zero, got {width}x{height}")]
    InvalidRenderedSize { width: u32, height: u32 },
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
    #[error("A crop is already being generated")]
    Busy,
    #[error("Crop session changed while the crop was being generated")]
    Stale,
    #[error("Failed to encode cropped image: {0}")]
    Encode(String),
    #[error("Failed to write cropped image: {0}")]
    Write(String),
}

impl CropError {
    /// Whether this error ended a load attempt (as opposed to rejecting one action).
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            CropError::Read(_) | CropError::Decode(_) | CropError::Dimension { .. }
        )
    }

    /// Underlying cause of a read or decode failure, as reported by the
    /// filesystem or decoder.
    pub fn cause(&self) -> Option<&str> {
        match self {
            CropError::Read(cause) | CropError::Decode(cause) => Some(cause),
            _ => None,
        }
    }
}

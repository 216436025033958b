//! Pure calculation functions for crop geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Three coordinate spaces are involved:
//!
//! - **Percent**: selection relative to the image, `0..=100` on each axis.
//! - **Display**: pixels of the scaled on-screen preview (`rendered` size).
//! - **Natural**: pixels of the full-resolution source (`natural` size).
//!
//! Crops are always cut from natural pixels. Display rectangles are scaled
//! per axis by `natural / rendered`; the two factors are never assumed equal.

use serde::{Deserialize, Serialize};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A rectangle in floating point coordinates of some space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// The exact natural-pixel rectangle a crop was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionUnit {
    Percent,
    Pixels,
}

/// The user's selection over the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub unit: SelectionUnit,
    pub rect: Rect,
}

impl Selection {
    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: SelectionUnit::Percent,
            rect: Rect::new(x, y, width, height),
        }
    }

    pub fn pixels(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            unit: SelectionUnit::Pixels,
            rect: Rect::new(x, y, width, height),
        }
    }

    /// The selection in display pixels of an image rendered at `rendered`.
    pub fn to_display(self, rendered: Size) -> Rect {
        match self.unit {
            SelectionUnit::Pixels => self.rect,
            SelectionUnit::Percent => {
                let sx = rendered.width as f64 / 100.0;
                let sy = rendered.height as f64 / 100.0;
                Rect::new(
                    self.rect.x * sx,
                    self.rect.y * sy,
                    self.rect.width * sx,
                    self.rect.height * sy,
                )
            }
        }
    }

    /// Keep the selection inside the image, shrinking before shifting.
    pub fn clamped(self, rendered: Size) -> Self {
        let (bound_w, bound_h) = match self.unit {
            SelectionUnit::Percent => (100.0, 100.0),
            SelectionUnit::Pixels => (rendered.width as f64, rendered.height as f64),
        };
        let width = self.rect.width.clamp(0.0, bound_w);
        let height = self.rect.height.clamp(0.0, bound_h);
        let x = self.rect.x.clamp(0.0, bound_w - width);
        let y = self.rect.y.clamp(0.0, bound_h - height);
        Self {
            unit: self.unit,
            rect: Rect::new(x, y, width, height),
        }
    }
}

/// Fraction of the image width an aspect-constrained default selection spans.
const DEFAULT_SPAN_PERCENT: f64 = 80.0;

/// Centered default selection for a fixed aspect ratio (`width / height`).
///
/// The box starts at 80% of the natural width with its height derived from
/// the ratio in natural pixels. If that overflows the image it is shrunk to
/// fit, keeping the ratio, and then centered.
///
/// # Examples
/// ```
/// # use gallery_kit::crop::calculations::{aspect_selection, Selection, Size};
/// // Square over a square image: an 80% box with a 10% margin all round
/// assert_eq!(
///     aspect_selection(1.0, Size::new(1000, 1000)),
///     Selection::percent(10.0, 10.0, 80.0, 80.0)
/// );
/// ```
pub fn aspect_selection(aspect: f64, natural: Size) -> Selection {
    let nat_w = natural.width as f64;
    let nat_h = natural.height as f64;

    let mut width = nat_w * DEFAULT_SPAN_PERCENT / 100.0;
    let mut height = width / aspect;
    if height > nat_h {
        height = nat_h;
        width = height * aspect;
    }
    if width > nat_w {
        width = nat_w;
        height = width / aspect;
    }

    let width_pct = width / nat_w * 100.0;
    let height_pct = height / nat_h * 100.0;
    Selection::percent(
        (100.0 - width_pct) / 2.0,
        (100.0 - height_pct) / 2.0,
        width_pct,
        height_pct,
    )
}

/// Default selection without an aspect constraint: 80%×80% at 10%,10%.
pub fn free_form_selection() -> Selection {
    Selection::percent(10.0, 10.0, DEFAULT_SPAN_PERCENT, DEFAULT_SPAN_PERCENT)
}

/// Default selection for `aspect` (`0.0` meaning free form).
pub fn default_selection(aspect: f64, natural: Size) -> Selection {
    if aspect > 0.0 && !natural.is_empty() {
        aspect_selection(aspect, natural)
    } else {
        free_form_selection()
    }
}

/// Per-axis scale from display to natural pixels.
pub fn axis_scale(natural: Size, rendered: Size) -> (f64, f64) {
    (
        natural.width as f64 / rendered.width as f64,
        natural.height as f64 / rendered.height as f64,
    )
}

/// Multiply each field by its own axis factor.
pub fn scale_rect(rect: Rect, (scale_x, scale_y): (f64, f64)) -> Rect {
    Rect::new(
        rect.x * scale_x,
        rect.y * scale_y,
        rect.width * scale_x,
        rect.height * scale_y,
    )
}

/// The selection expressed in natural pixels.
pub fn to_natural(selection: Selection, natural: Size, rendered: Size) -> Rect {
    let display = selection.to_display(rendered);
    scale_rect(display, axis_scale(natural, rendered))
}

/// Map a natural-space rectangle back into `unit` for a preview drawn at `rendered`.
pub fn from_natural(rect: Rect, unit: SelectionUnit, natural: Size, rendered: Size) -> Selection {
    match unit {
        SelectionUnit::Pixels => {
            let (scale_x, scale_y) = axis_scale(natural, rendered);
            Selection::pixels(
                rect.x / scale_x,
                rect.y / scale_y,
                rect.width / scale_x,
                rect.height / scale_y,
            )
        }
        SelectionUnit::Percent => {
            let sx = 100.0 / natural.width as f64;
            let sy = 100.0 / natural.height as f64;
            Selection::percent(rect.x * sx, rect.y * sy, rect.width * sx, rect.height * sy)
        }
    }
}

/// Fit a natural-space rectangle to `aspect` (`0.0` for free form) and to
/// the `min` box, keeping it inside `natural`.
///
/// The ratio is met by shrinking one axis with the top-left corner fixed.
/// A box below the minimum grows from the same corner and is then shifted
/// back inside the image. When the minimum cannot be met at the ratio, the
/// largest box that fits wins.
///
/// # Examples
/// ```
/// # use gallery_kit::crop::calculations::{constrain, Rect, Size};
/// // A square drag under 16:9 keeps its width and loses height
/// let rect = constrain(Rect::new(0.0, 0.0, 640.0, 640.0), 16.0 / 9.0, Size::new(1, 1), Size::new(1600, 900));
/// assert_eq!((rect.width.round(), rect.height.round()), (640.0, 360.0));
/// ```
pub fn constrain(rect: Rect, aspect: f64, min: Size, natural: Size) -> Rect {
    let nat_w = natural.width as f64;
    let nat_h = natural.height as f64;
    let min_w = (min.width as f64).min(nat_w);
    let min_h = (min.height as f64).min(nat_h);
    let mut width = rect.width.max(0.0);
    let mut height = rect.height.max(0.0);

    if aspect > 0.0 {
        if height > 0.0 && width / height > aspect {
            width = height * aspect;
        } else {
            height = width / aspect;
        }
        height = height.max(min_h).max(min_w / aspect);
        width = height * aspect;
        if height > nat_h {
            height = nat_h;
            width = height * aspect;
        }
        if width > nat_w {
            width = nat_w;
            height = width / aspect;
        }
    } else {
        width = width.clamp(min_w, nat_w);
        height = height.clamp(min_h, nat_h);
    }

    Rect::new(
        rect.x.clamp(0.0, nat_w - width),
        rect.y.clamp(0.0, nat_h - height),
        width,
        height,
    )
}

/// Snap a natural-space rectangle to whole pixels inside `bounds`.
///
/// Edges are rounded independently so adjacent crops tile without gaps.
/// Returns `None` when nothing of the rectangle is left.
pub fn to_pixel_rect(rect: Rect, bounds: Size) -> Option<PixelRect> {
    let snap = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
    let x0 = snap(rect.x, bounds.width);
    let y0 = snap(rect.y, bounds.height);
    let x1 = snap(rect.x + rect.width, bounds.width);
    let y1 = snap(rect.y + rect.height, bounds.height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Largest size that fits inside `max` while keeping the source ratio.
///
/// Never upscales: a source that already fits is returned unchanged.
pub fn fit_within(source: Size, max: Size) -> Size {
    if source.width <= max.width && source.height <= max.height {
        return source;
    }
    let ratio = (max.width as f64 / source.width as f64).min(max.height as f64 / source.height as f64);
    Size::new(
        ((source.width as f64 * ratio).round() as u32).max(1),
        ((source.height as f64 * ratio).round() as u32).max(1),
    )
}

//! The crop session state machine.
//!
//! ```text
//!   Idle ──load──▶ ImageLoading ──decoded, big enough──▶ Ready
//!                        │                                 │ begin_selection
//!                        └──read/decode/size error──▶ Failed
//!                                                          ▼
//!          reset / set_aspect / set_selection ◀──────  Selecting ──apply──▶ Completed
//! ```
//!
//! `cancel` returns any phase to `Idle` and drops the image. `reset` goes
//! back to `Selecting` from any phase that still holds an image.
//!
//! Applying is split in two ([`CropSession::begin_apply`] →
//! [`CropJob::render`] → [`CropSession::finish_apply`]) so the pixel work can
//! run off the UI thread. While a job is out, further applies are refused
//! with [`CropError::Busy`]; any edit to the selection in the meantime makes
//! the job's result stale and it is dropped on arrival.

use super::CropError;
use super::calculations::{self, PixelRect, Selection, Size};
use super::raster;
use crate::config::{AspectPreset, CropConfig};
use crate::types::ImageType;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum CropPhase {
    Idle,
    ImageLoading,
    Ready,
    Selecting,
    Completed,
    Failed(CropError),
}

impl CropPhase {
    pub fn name(&self) -> &'static str {
        match self {
            CropPhase::Idle => "idle",
            CropPhase::ImageLoading => "loading",
            CropPhase::Ready => "ready",
            CropPhase::Selecting => "selecting",
            CropPhase::Completed => "completed",
            CropPhase::Failed(_) => "failed",
        }
    }
}

/// The product of an applied crop.
#[derive(Debug, Clone)]
pub struct CropOutput {
    /// Full-resolution cropped pixels.
    pub image: DynamicImage,
    /// Natural-pixel rectangle the crop was cut from.
    pub rect: PixelRect,
    /// JPEG encoding of `image`, ready to upload.
    pub jpeg: Vec<u8>,
}

/// A crop ready to be rasterized, detached from the session.
#[derive(Debug, Clone)]
pub struct CropJob {
    generation: u64,
    image: Arc<DynamicImage>,
    rect: PixelRect,
    quality: u8,
}

impl CropJob {
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Cut and encode. Pure; safe to run on another thread.
    pub fn render(self) -> RenderedCrop {
        RenderedCrop {
            generation: self.generation,
            result: render_crop(&self.image, self.rect, self.quality),
        }
    }
}

/// A finished [`CropJob`], to be handed back to [`CropSession::finish_apply`].
#[derive(Debug)]
pub struct RenderedCrop {
    generation: u64,
    result: Result<CropOutput, CropError>,
}

fn render_crop(image: &DynamicImage, rect: PixelRect, quality: u8) -> Result<CropOutput, CropError> {
    let cropped = raster::crop(image, rect);
    let jpeg =
        raster::encode_jpeg(&cropped, quality).map_err(|e| CropError::Encode(e.to_string()))?;
    Ok(CropOutput {
        image: cropped,
        rect,
        jpeg,
    })
}

fn free_form_preset() -> AspectPreset {
    AspectPreset::new("free", None, "Free form")
}

/// One interactive crop over one source image.
#[derive(Debug)]
pub struct CropSession {
    config: CropConfig,
    preset: AspectPreset,
    phase: CropPhase,
    image: Option<Arc<DynamicImage>>,
    rendered: Option<Size>,
    selection: Option<Selection>,
    result: Option<CropOutput>,
    /// Bumped on every edit that changes what `apply` would produce.
    generation: u64,
    in_flight: bool,
}

impl CropSession {
    /// A fresh session using the configured default preset.
    pub fn new(config: &CropConfig) -> Self {
        let preset = config
            .preset(&config.default_preset)
            .cloned()
            .unwrap_or_else(free_form_preset);
        Self {
            config: config.clone(),
            preset,
            phase: CropPhase::Idle,
            image: None,
            rendered: None,
            selection: None,
            result: None,
            generation: 0,
            in_flight: false,
        }
    }

    pub fn with_preset(config: &CropConfig, preset: &str) -> Result<Self, CropError> {
        let mut session = Self::new(config);
        session.set_aspect(preset)?;
        Ok(session)
    }

    /// A session opened from the gallery for an image of the given type.
    pub fn for_image_type(config: &CropConfig, image_type: ImageType) -> Self {
        let mut session = Self::new(config);
        if let Some(preset) = config.preset(config.preset_for(image_type)) {
            session.preset = preset.clone();
        }
        session
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn phase(&self) -> &CropPhase {
        &self.phase
    }

    pub fn preset(&self) -> &AspectPreset {
        &self.preset
    }

    pub fn presets(&self) -> &[AspectPreset] {
        &self.config.presets
    }

    pub fn natural_size(&self) -> Option<Size> {
        self.image.as_deref().map(raster::dimensions)
    }

    pub fn rendered_size(&self) -> Option<Size> {
        self.rendered
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn result(&self) -> Option<&CropOutput> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&CropError> {
        match &self.phase {
            CropPhase::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Drop the current image and wait for a new one.
    pub fn begin_loading(&mut self) {
        self.discard();
        self.phase = CropPhase::ImageLoading;
    }

    /// Load and decode a local file.
    pub fn load_file(&mut self, path: &Path) -> Result<Size, CropError> {
        self.begin_loading();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(CropError::Read(e.to_string()))),
        };
        self.decode_loaded(&bytes)
    }

    /// Load from encoded bytes (a fetched URL body, a pasted blob, ...).
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<Size, CropError> {
        self.begin_loading();
        self.decode_loaded(bytes)
    }

    fn decode_loaded(&mut self, bytes: &[u8]) -> Result<Size, CropError> {
        match raster::decode(bytes) {
            Ok(image) => self.image_loaded(image),
            Err(e) => Err(self.fail(CropError::Decode(e.to_string()))),
        }
    }

    /// Finish a load started with [`begin_loading`](Self::begin_loading).
    ///
    /// Enforces the configured minimum natural size.
    pub fn image_loaded(&mut self, image: DynamicImage) -> Result<Size, CropError> {
        if self.phase != CropPhase::ImageLoading {
            return Err(self.invalid("finish loading"));
        }
        let natural = raster::dimensions(&image);
        if natural.width < self.config.min_width || natural.height < self.config.min_height {
            return Err(self.fail(CropError::Dimension {
                width: natural.width,
                height: natural.height,
                min_width: self.config.min_width,
                min_height: self.config.min_height,
            }));
        }
        debug!(width = natural.width, height = natural.height, "crop source loaded");
        self.image = Some(Arc::new(image));
        self.rendered = Some(natural);
        self.phase = CropPhase::Ready;
        Ok(natural)
    }

    /// Record that an external loader could not produce the image.
    pub fn fail_loading(&mut self, reason: &str) -> CropError {
        self.discard();
        self.fail(CropError::Decode(reason.to_string()))
    }

    fn fail(&mut self, err: CropError) -> CropError {
        warn!(
            error = %err,
            cause = err.cause().unwrap_or_default(),
            "crop source failed to load"
        );
        self.phase = CropPhase::Failed(err.clone());
        err
    }

    fn invalid(&self, action: &'static str) -> CropError {
        CropError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    fn discard(&mut self) {
        self.image = None;
        self.rendered = None;
        self.selection = None;
        self.result = None;
        self.in_flight = false;
        self.generation += 1;
    }

    // =========================================================================
    // Selecting
    // =========================================================================

    /// Size the image is drawn at on screen. Defaults to the natural size.
    ///
    /// A changed size invalidates an applied crop: the session goes back to
    /// `Selecting` with the selection refitted to the new preview.
    pub fn set_rendered_size(&mut self, width: u32, height: u32) -> Result<(), CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::InvalidRenderedSize { width, height });
        }
        if self.image.is_none() {
            return Err(CropError::NoImage);
        }
        let rendered = Size::new(width, height);
        if self.rendered == Some(rendered) {
            return Ok(());
        }
        self.rendered = Some(rendered);
        self.generation += 1;
        if let Some(selection) = self.selection {
            self.selection = Some(self.constrain(selection)?);
        }
        if self.phase == CropPhase::Completed {
            self.result = None;
            self.phase = CropPhase::Selecting;
        }
        Ok(())
    }

    fn default_selection(&self) -> Result<Selection, CropError> {
        let natural = self.natural_size().ok_or(CropError::NoImage)?;
        Ok(calculations::default_selection(self.preset.value(), natural))
    }

    /// `Ready → Selecting` with the preset's default rectangle.
    pub fn begin_selection(&mut self) -> Result<Selection, CropError> {
        if self.phase != CropPhase::Ready {
            return Err(self.invalid("begin selection"));
        }
        self.restart_selection()
    }

    fn restart_selection(&mut self) -> Result<Selection, CropError> {
        let selection = self.default_selection()?;
        self.selection = Some(selection);
        self.result = None;
        self.in_flight = false;
        self.generation += 1;
        self.phase = CropPhase::Selecting;
        Ok(selection)
    }

    /// Switch preset. While selecting (or after a crop) the rectangle is
    /// replaced by the new preset's default, not rescaled.
    pub fn set_aspect(&mut self, name: &str) -> Result<(), CropError> {
        let preset = self
            .config
            .preset(name)
            .cloned()
            .ok_or_else(|| CropError::UnknownPreset(name.to_string()))?;
        debug!(preset = %preset.name, "crop preset selected");
        self.preset = preset;
        if matches!(self.phase, CropPhase::Selecting | CropPhase::Completed) {
            self.restart_selection()?;
        }
        Ok(())
    }

    /// The user dragged the selection.
    ///
    /// The rectangle is held to the preset's ratio (measured in natural
    /// pixels) and to the configured minimum size, and kept inside the image.
    /// Returns the selection as stored.
    pub fn set_selection(&mut self, selection: Selection) -> Result<Selection, CropError> {
        if !matches!(self.phase, CropPhase::Selecting | CropPhase::Completed) {
            return Err(self.invalid("change the selection"));
        }
        let constrained = self.constrain(selection)?;
        self.selection = Some(constrained);
        self.result = None;
        self.generation += 1;
        self.phase = CropPhase::Selecting;
        Ok(constrained)
    }

    fn constrain(&self, selection: Selection) -> Result<Selection, CropError> {
        let natural = self.natural_size().ok_or(CropError::NoImage)?;
        let rendered = self.rendered.unwrap_or(natural);
        let min = Size::new(self.config.min_width, self.config.min_height);
        let rect = calculations::to_natural(selection.clamped(rendered), natural, rendered);
        let rect = calculations::constrain(rect, self.preset.value(), min, natural);
        Ok(calculations::from_natural(rect, selection.unit, natural, rendered))
    }

    /// Back to `Selecting` with the default rectangle of the current preset.
    pub fn reset(&mut self) -> Result<Selection, CropError> {
        if self.image.is_none() {
            return Err(CropError::NoImage);
        }
        self.restart_selection()
    }

    /// The natural-pixel rectangle the current selection maps to.
    pub fn crop_rect(&self) -> Result<PixelRect, CropError> {
        let natural = self.natural_size().ok_or(CropError::NoImage)?;
        let selection = self.selection.ok_or(CropError::NoSelection)?;
        let rendered = self.rendered.unwrap_or(natural);
        let rect = calculations::to_natural(selection, natural, rendered);
        calculations::to_pixel_rect(rect, natural).ok_or(CropError::EmptyCrop)
    }

    // =========================================================================
    // Applying and exporting
    // =========================================================================

    /// Whether the "apply crop" control should be enabled.
    pub fn can_apply(&self) -> bool {
        self.phase == CropPhase::Selecting && !self.in_flight && self.crop_rect().is_ok()
    }

    /// Start an apply. Refused while another one is outstanding.
    pub fn begin_apply(&mut self) -> Result<CropJob, CropError> {
        if self.in_flight {
            return Err(CropError::Busy);
        }
        if self.phase != CropPhase::Selecting {
            return Err(self.invalid("apply crop"));
        }
        let rect = self.crop_rect()?;
        let image = self.image.clone().ok_or(CropError::NoImage)?;
        self.in_flight = true;
        Ok(CropJob {
            generation: self.generation,
            image,
            rect,
            quality: self.config.jpeg_quality,
        })
    }

    /// Accept a rendered job. Results for an outdated selection are dropped.
    pub fn finish_apply(&mut self, rendered: RenderedCrop) -> Result<&CropOutput, CropError> {
        if rendered.generation != self.generation {
            debug!("dropping stale crop result");
            return Err(CropError::Stale);
        }
        self.in_flight = false;
        let output = rendered.result?;
        debug!(
            x = output.rect.x,
            y = output.rect.y,
            width = output.rect.width,
            height = output.rect.height,
            "crop applied"
        );
        self.phase = CropPhase::Completed;
        Ok(&*self.result.insert(output))
    }

    /// `Selecting → Completed`, rendering inline.
    pub fn apply(&mut self) -> Result<&CropOutput, CropError> {
        let job = self.begin_apply()?;
        let rendered = job.render();
        self.finish_apply(rendered)
    }

    /// Render the current selection without changing phase.
    pub fn preview(&self) -> Result<DynamicImage, CropError> {
        let rect = self.crop_rect()?;
        let image = self.image.as_deref().ok_or(CropError::NoImage)?;
        Ok(raster::crop(image, rect))
    }

    /// The applied crop, or one rendered on demand. Never changes phase.
    pub fn export(&self) -> Result<CropOutput, CropError> {
        match (&self.phase, &self.result) {
            (CropPhase::Completed, Some(output)) => Ok(output.clone()),
            (CropPhase::Selecting, _) => {
                let image = self.image.as_deref().ok_or(CropError::NoImage)?;
                render_crop(image, self.crop_rect()?, self.config.jpeg_quality)
            }
            _ => Err(self.invalid("export crop")),
        }
    }

    /// Write [`export`](Self::export) as a JPEG file.
    pub fn export_to(&self, path: &Path) -> Result<PixelRect, CropError> {
        let output = self.export()?;
        raster::save_jpeg(path, &output.jpeg).map_err(|e| CropError::Write(e.to_string()))?;
        Ok(output.rect)
    }

    /// Abandon the session. Nothing is persisted.
    pub fn cancel(&mut self) {
        self.discard();
        self.phase = CropPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, gradient_png};

    fn session() -> CropSession {
        CropSession::new(&CropConfig::default())
    }

    /// Session with a loaded 800x600 source, in `Ready`.
    fn ready(preset: &str) -> CropSession {
        let mut s = CropSession::with_preset(&CropConfig::default(), preset).unwrap();
        s.begin_loading();
        s.image_loaded(gradient(800, 600)).unwrap();
        s
    }

    fn selecting(preset: &str) -> CropSession {
        let mut s = ready(preset);
        s.begin_selection().unwrap();
        s
    }

    fn approx(a: Selection, b: Selection) -> bool {
        let eps = 1e-9;
        a.unit == b.unit
            && (a.rect.x - b.rect.x).abs() < eps
            && (a.rect.y - b.rect.y).abs() < eps
            && (a.rect.width - b.rect.width).abs() < eps
            && (a.rect.height - b.rect.height).abs() < eps
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn new_session_is_idle_with_default_preset() {
        let s = session();
        assert_eq!(s.phase(), &CropPhase::Idle);
        assert_eq!(s.preset().name, "banner");
        assert_eq!(s.presets().len(), 5);
    }

    #[test]
    fn for_image_type_picks_matching_preset() {
        let config = CropConfig::default();
        assert_eq!(CropSession::for_image_type(&config, ImageType::Gallery).preset().name, "gallery");
        assert_eq!(CropSession::for_image_type(&config, ImageType::Banner).preset().name, "banner");
    }

    #[test]
    fn load_bytes_reaches_ready() {
        let mut s = session();
        let size = s.load_bytes(&gradient_png(640, 480)).unwrap();
        assert_eq!(size, Size::new(640, 480));
        assert_eq!(s.phase(), &CropPhase::Ready);
        assert_eq!(s.rendered_size(), Some(size));
    }

    #[test]
    fn too_small_source_never_reaches_selecting() {
        let mut s = session();
        let err = s.load_bytes(&gradient_png(300, 200)).unwrap_err();
        assert_eq!(
            err,
            CropError::Dimension {
                width: 300,
                height: 200,
                min_width: 400,
                min_height: 300
            }
        );
        assert_eq!(err.to_string(), "Image is too small. Minimum dimensions: 400x300px");
        assert!(matches!(s.phase(), CropPhase::Failed(CropError::Dimension { .. })));
        assert!(s.begin_selection().is_err());
        assert_eq!(s.reset(), Err(CropError::NoImage));
        assert!(s.selection().is_none());
    }

    #[test]
    fn undecodable_bytes_fail_with_load_message() {
        let mut s = session();
        let err = s.load_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, CropError::Decode(_)));
        assert_eq!(err.to_string(), "Failed to load image");
        assert!(err.cause().is_some_and(|c| !c.is_empty()));
        assert_eq!(s.error(), Some(&err));
    }

    #[test]
    fn missing_file_fails_with_read_message() {
        let mut s = session();
        let err = s.load_file(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert_eq!(err.to_string(), "Failed to read image file");
        assert!(err.is_load_failure());
        assert!(err.cause().is_some());
    }

    #[test]
    fn load_file_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.png");
        std::fs::write(&path, gradient_png(500, 400)).unwrap();

        let mut s = session();
        assert_eq!(s.load_file(&path).unwrap(), Size::new(500, 400));
    }

    #[test]
    fn failed_session_accepts_new_source() {
        let mut s = session();
        s.load_bytes(&gradient_png(100, 100)).unwrap_err();
        s.load_bytes(&gradient_png(400, 300)).unwrap();
        assert_eq!(s.phase(), &CropPhase::Ready);
    }

    #[test]
    fn external_loader_failure() {
        let mut s = session();
        s.begin_loading();
        assert_eq!(s.phase(), &CropPhase::ImageLoading);
        let err = s.fail_loading("HTTP 404");
        assert_eq!(err, CropError::Decode("HTTP 404".into()));
        assert_eq!(err.cause(), Some("HTTP 404"));
        assert!(matches!(s.phase(), CropPhase::Failed(_)));
    }

    #[test]
    fn image_loaded_requires_loading_phase() {
        let mut s = session();
        assert_eq!(
            s.image_loaded(gradient(800, 600)),
            Err(CropError::InvalidTransition {
                action: "finish loading",
                phase: "idle"
            })
        );
    }

    // =========================================================================
    // Selecting
    // =========================================================================

    #[test]
    fn begin_selection_uses_centered_aspect_box() {
        // 4:3 on an 800x600 source: exactly 80% x 80%, 10% margins
        let mut s = ready("gallery");
        let sel = s.begin_selection().unwrap();
        assert!(approx(sel, Selection::percent(10.0, 10.0, 80.0, 80.0)));
        assert_eq!(s.phase(), &CropPhase::Selecting);
    }

    #[test]
    fn free_form_default_box() {
        let mut s = ready("free");
        assert_eq!(
            s.begin_selection().unwrap(),
            Selection::percent(10.0, 10.0, 80.0, 80.0)
        );
    }

    #[test]
    fn set_aspect_while_selecting_discards_rectangle() {
        let mut s = selecting("free");
        s.set_selection(Selection::percent(0.0, 0.0, 30.0, 30.0)).unwrap();

        s.set_aspect("square").unwrap();
        // 640px square does not fit 600px height: 600x600 → 75% x 100%
        let sel = s.selection().unwrap();
        assert!(approx(sel, Selection::percent(12.5, 0.0, 75.0, 100.0)));
        assert_eq!(s.phase(), &CropPhase::Selecting);
    }

    #[test]
    fn set_aspect_before_selecting_only_records() {
        let mut s = ready("banner");
        s.set_aspect("free").unwrap();
        assert_eq!(s.phase(), &CropPhase::Ready);
        assert!(s.selection().is_none());
        assert_eq!(s.begin_selection().unwrap(), Selection::percent(10.0, 10.0, 80.0, 80.0));
    }

    #[test]
    fn unknown_preset_rejected() {
        let mut s = selecting("banner");
        assert_eq!(
            s.set_aspect("cinema"),
            Err(CropError::UnknownPreset("cinema".into()))
        );
        assert_eq!(s.preset().name, "banner");
    }

    #[test]
    fn set_selection_clamps_inside_image() {
        let mut s = selecting("free");
        let sel = s.set_selection(Selection::pixels(700.0, 0.0, 500.0, 400.0)).unwrap();
        assert_eq!(sel, Selection::pixels(300.0, 0.0, 500.0, 400.0));
    }

    #[test]
    fn preset_ratio_holds_while_dragging() {
        let mut s = selecting("banner");
        s.set_selection(Selection::pixels(0.0, 0.0, 300.0, 300.0)).unwrap();
        // Square drag refitted to 16:9, then grown to the 300px minimum height
        let rect = s.apply().unwrap().rect;
        assert_eq!(
            rect,
            PixelRect {
                x: 0,
                y: 0,
                width: 533,
                height: 300
            }
        );
    }

    #[test]
    fn ratio_is_measured_in_natural_pixels() {
        let mut s = selecting("gallery");
        // x scale 2, y scale 4: 250x150 on screen is 500x600 natural
        s.set_rendered_size(400, 150).unwrap();
        let sel = s.set_selection(Selection::pixels(0.0, 0.0, 250.0, 150.0)).unwrap();
        assert!(approx(sel, Selection::pixels(0.0, 0.0, 250.0, 93.75)));
        assert_eq!(
            s.crop_rect().unwrap(),
            PixelRect {
                x: 0,
                y: 0,
                width: 500,
                height: 375
            }
        );
    }

    #[test]
    fn selection_grows_to_minimum_crop_size() {
        let mut s = selecting("free");
        let sel = s.set_selection(Selection::pixels(700.0, 500.0, 10.0, 10.0)).unwrap();
        assert_eq!(sel, Selection::pixels(400.0, 300.0, 400.0, 300.0));

        let sel = s.set_selection(Selection::percent(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert!(approx(sel, Selection::percent(0.0, 0.0, 50.0, 50.0)));
    }

    #[test]
    fn set_selection_requires_selecting() {
        let mut s = ready("free");
        assert!(matches!(
            s.set_selection(Selection::percent(0.0, 0.0, 10.0, 10.0)),
            Err(CropError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn zero_rendered_size_rejected() {
        let mut s = ready("free");
        assert_eq!(
            s.set_rendered_size(0, 300),
            Err(CropError::InvalidRenderedSize { width: 0, height: 300 })
        );
    }

    // =========================================================================
    // Applying
    // =========================================================================

    #[test]
    fn apply_scales_display_rect_to_natural_pixels() {
        let mut s = selecting("free");
        s.set_rendered_size(400, 300).unwrap();
        s.set_selection(Selection::pixels(50.0, 25.0, 250.0, 200.0)).unwrap();

        let output = s.apply().unwrap();
        assert_eq!(
            output.rect,
            PixelRect {
                x: 100,
                y: 50,
                width: 500,
                height: 400
            }
        );
        assert_eq!(raster::dimensions(&output.image), Size::new(500, 400));
        let decoded = raster::decode(&output.jpeg).unwrap();
        assert_eq!(raster::dimensions(&decoded), Size::new(500, 400));
        assert_eq!(s.phase(), &CropPhase::Completed);
    }

    #[test]
    fn apply_uses_independent_axis_scales() {
        let mut s = selecting("free");
        // Squashed preview: x scale 2, y scale 4
        s.set_rendered_size(400, 150).unwrap();
        s.set_selection(Selection::pixels(10.0, 10.0, 250.0, 100.0)).unwrap();
        assert_eq!(
            s.crop_rect().unwrap(),
            PixelRect {
                x: 20,
                y: 40,
                width: 500,
                height: 400
            }
        );
    }

    #[test]
    fn apply_outside_selecting_is_rejected() {
        let mut s = ready("free");
        assert!(matches!(s.apply(), Err(CropError::InvalidTransition { .. })));
        assert!(!s.can_apply());
    }

    #[test]
    fn duplicate_apply_is_refused_while_in_flight() {
        let mut s = selecting("banner");
        assert!(s.can_apply());

        let job = s.begin_apply().unwrap();
        assert!(s.is_busy());
        assert!(!s.can_apply());
        assert_eq!(s.begin_apply().unwrap_err(), CropError::Busy);

        s.finish_apply(job.render()).unwrap();
        assert!(!s.is_busy());
        assert_eq!(s.phase(), &CropPhase::Completed);
    }

    #[test]
    fn result_for_changed_selection_is_dropped() {
        let mut s = selecting("banner");
        let job = s.begin_apply().unwrap();
        s.reset().unwrap();

        assert_eq!(s.finish_apply(job.render()).unwrap_err(), CropError::Stale);
        assert_eq!(s.phase(), &CropPhase::Selecting);
        assert!(s.result().is_none());
        assert!(s.can_apply());
    }

    #[test]
    fn reset_from_completed_returns_to_selecting() {
        let mut s = selecting("gallery");
        s.set_selection(Selection::percent(0.0, 0.0, 20.0, 20.0)).unwrap();
        s.apply().unwrap();

        let sel = s.reset().unwrap();
        assert!(approx(sel, Selection::percent(10.0, 10.0, 80.0, 80.0)));
        assert_eq!(s.phase(), &CropPhase::Selecting);
        assert!(s.result().is_none());
    }

    #[test]
    fn rendered_size_change_invalidates_applied_crop() {
        let mut s = selecting("free");
        s.set_selection(Selection::pixels(0.0, 0.0, 400.0, 300.0)).unwrap();
        let applied = s.apply().unwrap().rect;

        // Same pixel selection over a half-size preview covers the whole image
        s.set_rendered_size(400, 300).unwrap();
        assert_eq!(s.phase(), &CropPhase::Selecting);
        assert!(s.result().is_none());
        let exported = s.export().unwrap().rect;
        assert_eq!(exported, s.crop_rect().unwrap());
        assert_ne!(exported, applied);
        assert_eq!(
            exported,
            PixelRect {
                x: 0,
                y: 0,
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn unchanged_rendered_size_keeps_applied_crop() {
        let mut s = selecting("free");
        s.apply().unwrap();
        s.set_rendered_size(800, 600).unwrap();
        assert_eq!(s.phase(), &CropPhase::Completed);
        assert!(s.result().is_some());
    }

    #[test]
    fn reset_without_image_errors() {
        assert_eq!(session().reset(), Err(CropError::NoImage));
    }

    // =========================================================================
    // Exporting
    // =========================================================================

    #[test]
    fn export_while_selecting_renders_without_transition() {
        let s = selecting("free");
        let output = s.export().unwrap();
        assert_eq!(
            output.rect,
            PixelRect {
                x: 80,
                y: 60,
                width: 640,
                height: 480
            }
        );
        assert_eq!(s.phase(), &CropPhase::Selecting);
        assert!(s.result().is_none());
    }

    #[test]
    fn export_after_apply_returns_applied_crop() {
        let mut s = selecting("free");
        let applied = s.apply().unwrap().rect;
        assert_eq!(s.export().unwrap().rect, applied);
        assert_eq!(s.phase(), &CropPhase::Completed);
    }

    #[test]
    fn export_to_writes_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cropped.jpg");
        let s = selecting("square");
        let rect = s.export_to(&path).unwrap();

        let written = raster::decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raster::dimensions(&written), Size::new(rect.width, rect.height));
    }

    #[test]
    fn export_from_idle_is_rejected() {
        assert!(matches!(
            session().export(),
            Err(CropError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn preview_matches_crop_rect() {
        let s = selecting("banner");
        let rect = s.crop_rect().unwrap();
        let preview = s.preview().unwrap();
        assert_eq!(raster::dimensions(&preview), Size::new(rect.width, rect.height));
    }

    #[test]
    fn cancel_discards_everything() {
        let mut s = selecting("banner");
        s.apply().unwrap();
        s.cancel();
        assert_eq!(s.phase(), &CropPhase::Idle);
        assert!(s.natural_size().is_none());
        assert!(s.selection().is_none());
        assert!(s.result().is_none());
    }
}

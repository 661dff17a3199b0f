//! Pan/zoom view state and the image fit shared by rendering and hit-testing.
//!
//! Three coordinate spaces are involved:
//! - viewport space: drawing surface pixels, origin top-left;
//! - fit space: viewport space before the view transform is applied, where
//!   the image is letterboxed by [`ImageFit`];
//! - image space: source pixels of the open image.
//!
//! `viewport = translate + scale * fit` and
//! `fit = offset + image * (draw / image_size)`.

use crate::constants::zoom;
use crate::geometry::ImagePoint;

/// Size of the drawing surface in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Placement of a letterboxed image inside the viewport.
///
/// This is the single source of truth for where image pixels land; the
/// renderer and pointer conversion both consume it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFit {
    pub draw_width: f64,
    pub draw_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub image_width: f64,
    pub image_height: f64,
}

impl ImageFit {
    /// Fit an image of `(width, height)` inside the viewport, preserving its
    /// aspect ratio and centering the remainder.
    ///
    /// Returns `None` for empty images or viewports.
    ///
    /// The fit uses the unscaled viewport; zoom is applied on top by
    /// [`ViewTransform`], never by shrinking the viewport first.
    pub fn compute(image: (u32, u32), viewport: Viewport) -> Option<Self> {
        let (image_width, image_height) = (f64::from(image.0), f64::from(image.1));
        if image_width <= 0.0 || image_height <= 0.0 || viewport.is_empty() {
            return None;
        }

        let image_aspect = image_width / image_height;
        let viewport_aspect = viewport.width / viewport.height;

        let (draw_width, draw_height, offset_x, offset_y) = if image_aspect > viewport_aspect {
            let draw_width = viewport.width;
            let draw_height = draw_width / image_aspect;
            (draw_width, draw_height, 0.0, (viewport.height - draw_height) / 2.0)
        } else {
            let draw_height = viewport.height;
            let draw_width = draw_height * image_aspect;
            (draw_width, draw_height, (viewport.width - draw_width) / 2.0, 0.0)
        };

        Some(Self {
            draw_width,
            draw_height,
            offset_x,
            offset_y,
            image_width,
            image_height,
        })
    }

    /// Fit-space pixels per image pixel along X.
    pub fn scale_x(&self) -> f64 {
        self.draw_width / self.image_width
    }

    /// Fit-space pixels per image pixel along Y.
    pub fn scale_y(&self) -> f64 {
        self.draw_height / self.image_height
    }

    /// Map an image coordinate into fit space.
    pub fn image_to_fit(&self, point: ImagePoint) -> (f64, f64) {
        (
            self.offset_x + f64::from(point.x) * self.scale_x(),
            self.offset_y + f64::from(point.y) * self.scale_y(),
        )
    }

    /// Map a fit-space coordinate to fractional image space.
    pub fn fit_to_image(&self, fit_x: f64, fit_y: f64) -> (f64, f64) {
        (
            (fit_x - self.offset_x) * (self.image_width / self.draw_width),
            (fit_y - self.offset_y) * (self.image_height / self.draw_height),
        )
    }
}

/// Offset between the pointer and the translation, captured when a pan drag starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragAnchor {
    pub x: f64,
    pub y: f64,
}

/// Current pan/zoom state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    translate_x: f64,
    translate_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    pub const fn identity() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> (f64, f64) {
        (self.translate_x, self.translate_y)
    }

    /// Zoom level as a whole percentage, for status display.
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    /// Multiply the scale by `factor`, clamped to the zoom limits.
    ///
    /// With a center, the translation is adjusted so the image point under the
    /// center stays put on screen.
    pub fn zoom(&mut self, factor: f64, center: Option<(f64, f64)>) {
        if !(factor.is_finite() && factor > 0.0) {
            log::warn!("Ignoring invalid zoom factor {}", factor);
            return;
        }

        let old_scale = self.scale;
        self.scale = (self.scale * factor).clamp(zoom::MIN, zoom::MAX);

        if let Some((center_x, center_y)) = center {
            let ratio = self.scale / old_scale;
            self.translate_x = center_x - (center_x - self.translate_x) * ratio;
            self.translate_y = center_y - (center_y - self.translate_y) * ratio;
        }

        log::debug!(
            "Zoom: {:.2}x, translate ({:.1}, {:.1})",
            self.scale,
            self.translate_x,
            self.translate_y
        );
    }

    /// Set the translation directly.
    pub fn pan_to(&mut self, translate_x: f64, translate_y: f64) {
        self.translate_x = translate_x;
        self.translate_y = translate_y;
    }

    /// Capture the anchor that keeps the grabbed point under the pointer.
    pub fn begin_drag(&self, pointer_x: f64, pointer_y: f64) -> DragAnchor {
        DragAnchor {
            x: pointer_x - self.translate_x,
            y: pointer_y - self.translate_y,
        }
    }

    /// Move the view so the anchored point follows the pointer.
    pub fn drag_to(&mut self, anchor: DragAnchor, pointer_x: f64, pointer_y: f64) {
        self.pan_to(pointer_x - anchor.x, pointer_y - anchor.y);
    }

    /// Restore the identity transform.
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Remove the view transform from a viewport coordinate.
    pub fn viewport_to_fit(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.translate_x) / self.scale,
            (y - self.translate_y) / self.scale,
        )
    }

    /// Fractional image coordinate under a viewport position.
    pub fn viewport_to_image_exact(&self, fit: &ImageFit, x: f64, y: f64) -> (f64, f64) {
        let (fit_x, fit_y) = self.viewport_to_fit(x, y);
        fit.fit_to_image(fit_x, fit_y)
    }

    /// Image pixel under a viewport position, rounded to the nearest integer.
    pub fn viewport_to_image(&self, fit: &ImageFit, x: f64, y: f64) -> ImagePoint {
        let (image_x, image_y) = self.viewport_to_image_exact(fit, x, y);
        ImagePoint::rounded(image_x, image_y)
    }

    /// Viewport position of an image coordinate.
    pub fn image_to_viewport(&self, fit: &ImageFit, point: ImagePoint) -> (f64, f64) {
        let (fit_x, fit_y) = fit.image_to_fit(point);
        (
            self.translate_x + fit_x * self.scale,
            self.translate_y + fit_y * self.scale,
        )
    }
}

//! Software rasterization of the editor canvas.
//!
//! Shapes are built in fit space and drawn through the view transform, so
//! sizes given in viewport pixels are divided by the zoom scale.

use crate::config::RenderStyle;
use crate::constants::placeholder;
use crate::error::{EditorError, Result};
use crate::geometry::ImagePoint;
use crate::model::{Annotation, CellLabel, Geometry};
use crate::view::{ImageFit, ViewTransform, Viewport};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

/// Everything needed to draw one frame.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub viewport: Viewport,
    pub view: ViewTransform,
    /// Pixels of the open image.
    pub image: Option<&'a Pixmap>,
    /// Placement of the open image; `None` skips image and annotations.
    pub fit: Option<ImageFit>,
    pub annotations: &'a [Annotation],
    /// Vertices of the polygon under construction.
    pub polygon: &'a [ImagePoint],
    /// Label of the polygon under construction.
    pub label: CellLabel,
}

/// Draws frames with a fixed style.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    style: RenderStyle,
}

impl Renderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Rasterize a frame at the viewport size.
    pub fn render(&self, frame: &Frame<'_>) -> Result<Pixmap> {
        let width = frame.viewport.width.ceil() as u32;
        let height = frame.viewport.height.ceil() as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            EditorError::validation(format!("cannot allocate a {}x{} surface", width, height))
        })?;

        let [r, g, b, a] = self.style.background;
        pixmap.fill(Color::from_rgba8(r, g, b, a));

        let Some(fit) = frame.fit else {
            return Ok(pixmap);
        };

        let scale = frame.view.scale() as f32;
        let (tx, ty) = frame.view.translate();
        let view = Transform::from_row(scale, 0.0, 0.0, scale, tx as f32, ty as f32);

        if let Some(image) = frame.image {
            draw_image(&mut pixmap, image, &fit, scale, (tx as f32, ty as f32));
        }

        for annotation in frame.annotations {
            self.draw_annotation(&mut pixmap, annotation, &fit, scale, view);
        }

        if !frame.polygon.is_empty() {
            self.draw_polygon_in_progress(&mut pixmap, frame.polygon, frame.label, &fit, scale, view);
        }

        Ok(pixmap)
    }

    fn draw_annotation(
        &self,
        pixmap: &mut Pixmap,
        annotation: &Annotation,
        fit: &ImageFit,
        scale: f32,
        view: Transform,
    ) {
        let [r, g, b] = annotation.label.color();
        match &annotation.geometry {
            Geometry::Point(point) => {
                let (x, y) = fit_position(fit, *point);
                let Some(circle) = PathBuilder::from_circle(x, y, self.style.point_radius / scale) else {
                    return;
                };
                pixmap.fill_path(&circle, &paint(r, g, b, 0xff), FillRule::Winding, view, None);
                let outline = Stroke {
                    width: self.style.point_outline_width / scale,
                    ..Default::default()
                };
                pixmap.stroke_path(&circle, &paint(0xff, 0xff, 0xff, 0xff), &outline, view, None);
            }
            Geometry::Polygon(ring) => {
                let Some(path) = ring_path(fit, ring, true) else {
                    log::trace!("Skipping degenerate polygon {}", annotation.id);
                    return;
                };
                pixmap.fill_path(
                    &path,
                    &paint(r, g, b, self.style.fill_alpha),
                    FillRule::Winding,
                    view,
                    None,
                );
                let outline = Stroke {
                    width: self.style.outline_width / scale,
                    ..Default::default()
                };
                pixmap.stroke_path(&path, &paint(r, g, b, 0xff), &outline, view, None);
            }
        }
    }

    fn draw_polygon_in_progress(
        &self,
        pixmap: &mut Pixmap,
        vertices: &[ImagePoint],
        label: CellLabel,
        fit: &ImageFit,
        scale: f32,
        view: Transform,
    ) {
        let [r, g, b] = label.color();
        let color = paint(r, g, b, 0xff);

        if let Some(path) = ring_path(fit, vertices, false) {
            let outline = Stroke {
                width: self.style.outline_width / scale,
                ..Default::default()
            };
            pixmap.stroke_path(&path, &color, &outline, view, None);
        }

        for vertex in vertices {
            let (x, y) = fit_position(fit, *vertex);
            if let Some(marker) = PathBuilder::from_circle(x, y, self.style.vertex_radius / scale) {
                pixmap.fill_path(&marker, &color, FillRule::Winding, view, None);
            }
        }
    }
}

fn paint(r: u8, g: u8, b: u8, a: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn fit_position(fit: &ImageFit, point: ImagePoint) -> (f32, f32) {
    let (x, y) = fit.image_to_fit(point);
    (x as f32, y as f32)
}

/// Path through the vertices in fit space. Needs at least two vertices.
fn ring_path(fit: &ImageFit, vertices: &[ImagePoint], close: bool) -> Option<Path> {
    let (first, rest) = vertices.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut pb = PathBuilder::new();
    let (x, y) = fit_position(fit, *first);
    pb.move_to(x, y);
    for vertex in rest {
        let (x, y) = fit_position(fit, *vertex);
        pb.line_to(x, y);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

/// Draw the image into its letterbox rectangle under the view transform.
fn draw_image(pixmap: &mut Pixmap, image: &Pixmap, fit: &ImageFit, scale: f32, translate: (f32, f32)) {
    // The decoded pixels may differ in size from the registered dimensions.
    let kx = fit.draw_width as f32 / image.width() as f32;
    let ky = fit.draw_height as f32 / image.height() as f32;
    let transform = Transform::from_row(
        scale * kx,
        0.0,
        0.0,
        scale * ky,
        translate.0 + scale * fit.offset_x as f32,
        translate.1 + scale * fit.offset_y as f32,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..Default::default()
    };
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
}

/// Convert decoded pixels into a premultiplied pixmap.
pub fn rgba_to_pixmap(image: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or_else(|| {
        EditorError::validation(format!(
            "cannot allocate a {}x{} pixmap",
            image.width(),
            image.height()
        ))
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Convert a rendered pixmap into straight-alpha pixels for encoding.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

/// Diagonal gradient shown when an image's pixels cannot be fetched.
pub fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    let span = (width + height).saturating_sub(2).max(1) as f32;
    RgbaImage::from_fn(width, height, |x, y| {
        let t = (x + y) as f32 / span;
        let mix = |start: u8, end: u8| -> u8 {
            (f32::from(start) + (f32::from(end) - f32::from(start)) * t).round() as u8
        };
        Rgba([
            mix(placeholder::START[0], placeholder::END[0]),
            mix(placeholder::START[1], placeholder::END[1]),
            mix(placeholder::START[2], placeholder::END[2]),
            0xff,
        ])
    })
}

//! The editor session: one open image, its annotations, the view and the
//! active tool.
//!
//! Every gesture runs to completion as a single `&mut self` call, awaiting
//! backend requests in sequence. Backend failures never escape pointer
//! handlers; they are turned into [`Notice`]s and logged.

use crate::backend::{AnnotationBackend, DetectionReport, Detector, ImageProvider};
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::geometry::ImagePoint;
use crate::interaction::{Canvas, Command, Cursor, InteractionState, Tool};
use crate::model::{Annotation, CellLabel, ImageId, ImageInfo, Statistics};
use crate::render::{self, Frame, Renderer};
use crate::store::AnnotationStore;
use crate::view::{ImageFit, ViewTransform, Viewport};
use std::collections::VecDeque;
use tiny_skia::Pixmap;

#[cfg(test)]
mod tests;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The image currently being annotated.
struct OpenImage {
    info: ImageInfo,
    /// `None` when even the placeholder could not be rasterized.
    pixels: Option<Pixmap>,
    placeholder: bool,
}

/// Explicit editor state shared by all gestures.
pub struct EditorSession<B> {
    backend: B,
    config: EditorConfig,
    viewport: Viewport,
    image: Option<OpenImage>,
    store: AnnotationStore,
    view: ViewTransform,
    interaction: InteractionState,
    label: CellLabel,
    renderer: Renderer,
    statistics: Option<Statistics>,
    notices: VecDeque<Notice>,
    needs_redraw: bool,
}

impl<B: AnnotationBackend + ImageProvider> EditorSession<B> {
    pub fn new(backend: B, config: EditorConfig, viewport: Viewport) -> Self {
        let interaction =
            InteractionState::new(config.preferences.default_tool, config.interaction.clone());
        Self {
            backend,
            label: config.preferences.default_label,
            renderer: Renderer::new(config.style.clone()),
            config,
            viewport,
            image: None,
            store: AnnotationStore::new(),
            view: ViewTransform::identity(),
            interaction,
            statistics: None,
            notices: VecDeque::new(),
            needs_redraw: true,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Change the drawing surface size. The view transform is kept.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            log::debug!("Viewport resized to {}x{}", viewport.width, viewport.height);
            self.viewport = viewport;
            self.needs_redraw = true;
        }
    }

    /// Open an image: fetch its metadata and pixels, reset the view and load
    /// its annotations.
    pub async fn open_image(&mut self, id: ImageId) -> Result<()> {
        let info = match self.backend.image_info(id).await {
            Ok(info) => info,
            Err(e) => return Err(self.report("Failed to open image", e)),
        };

        let (pixels, placeholder) = match self.backend.fetch_image(id).await {
            Ok(pixels) => (pixels, false),
            Err(e) => {
                log::warn!("Failed to fetch pixels for image {}: {}", id, e);
                self.notices.push_back(Notice::info(format!(
                    "Showing a placeholder for {}",
                    info.original_name
                )));
                (render::placeholder_image(info.width, info.height), true)
            }
        };
        let pixels = match render::rgba_to_pixmap(&pixels) {
            Ok(pixmap) => Some(pixmap),
            Err(e) => {
                log::warn!("Cannot rasterize image {}: {}", id, e);
                None
            }
        };

        self.view.reset();
        self.interaction.clear_for_image_change();
        // Bound before loading so a failed load still leaves the image editable.
        self.store.clear_for(id);
        self.statistics = None;
        log::info!(
            "Opened image {} '{}' ({}x{})",
            info.id,
            info.original_name,
            info.width,
            info.height
        );
        self.image = Some(OpenImage {
            info,
            pixels,
            placeholder,
        });
        self.needs_redraw = true;

        if let Err(e) = self.store.load(&self.backend, id).await {
            return Err(self.report("Failed to load annotations", e));
        }
        self.refresh_statistics().await;
        Ok(())
    }

    /// Close the open image, if any.
    pub fn close_image(&mut self) {
        if let Some(image) = self.image.take() {
            log::info!("Closed image {}", image.info.id);
        }
        self.store.clear();
        self.interaction.clear_for_image_change();
        self.statistics = None;
        self.needs_redraw = true;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.interaction.set_tool(tool);
        self.needs_redraw = true;
    }

    pub fn set_label(&mut self, label: CellLabel) {
        log::debug!("Label: {}", label);
        self.label = label;
        self.needs_redraw = true;
    }

    /// Discard the polygon under construction.
    pub fn cancel_polygon(&mut self) {
        if self.interaction.cancel_polygon() {
            log::debug!("Polygon cancelled");
            self.needs_redraw = true;
        }
    }

    /// Primary-button press at a viewport position.
    pub async fn pointer_down(&mut self, x: f64, y: f64) {
        let canvas = Canvas {
            fit: self.fit(),
            annotations: self.store.annotations(),
            label: self.label,
        };
        let command = self.interaction.pointer_down(x, y, &mut self.view, &canvas);
        self.execute(command).await;
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.interaction.pointer_move(x, y, &mut self.view) == Command::Redraw {
            self.needs_redraw = true;
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    /// Press and release at the same position.
    pub async fn click(&mut self, x: f64, y: f64) {
        self.pointer_down(x, y).await;
        self.pointer_up();
    }

    pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) {
        self.interaction.wheel(x, y, delta_y, &mut self.view);
        self.needs_redraw = true;
    }

    pub fn zoom_in(&mut self) {
        self.view.zoom(self.config.interaction.button_zoom_in, None);
        self.needs_redraw = true;
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom(self.config.interaction.button_zoom_out, None);
        self.needs_redraw = true;
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
        self.needs_redraw = true;
    }

    /// Run a detector on the open image and reload what it stored.
    pub async fn detect<D: Detector>(&mut self, detector: &D) -> Result<DetectionReport> {
        let Some(id) = self.image_id() else {
            return Err(self.report("Cannot run detection", EditorError::NoImageOpen));
        };

        let detected = detector.detect(id).await;

        // A failed run may still have stored some cells, so reload either way.
        let reloaded = self.store.load(&self.backend, id).await;
        self.refresh_statistics().await;
        self.needs_redraw = true;

        let report = match detected {
            Ok(report) => report,
            Err(e) => {
                if let Err(reload) = reloaded {
                    log::warn!("Failed to reload annotations after detection: {}", reload);
                }
                return Err(self.report("Detection failed", e));
            }
        };
        self.notices.push_back(Notice::success(format!(
            "Detected {} cells",
            report.detected_count
        )));
        if let Err(e) = reloaded {
            return Err(self.report("Failed to reload annotations", e));
        }
        Ok(report)
    }

    /// Re-fetch label statistics for the open image.
    pub async fn refresh_statistics(&mut self) {
        let Some(id) = self.image_id() else {
            self.statistics = None;
            return;
        };
        match self.backend.statistics(id).await {
            Ok(statistics) => self.statistics = Some(statistics),
            Err(e) => log::warn!("Failed to fetch statistics for image {}: {}", id, e),
        }
    }

    /// Draw the current state.
    pub fn render(&mut self) -> Result<Pixmap> {
        let frame = Frame {
            viewport: self.viewport,
            view: self.view,
            image: self.image.as_ref().and_then(|image| image.pixels.as_ref()),
            fit: self.fit(),
            annotations: self.store.annotations(),
            polygon: self.interaction.polygon(),
            label: self.label,
        };
        let pixmap = self.renderer.render(&frame)?;
        self.needs_redraw = false;
        Ok(pixmap)
    }

    /// Drain pending notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn tool(&self) -> Tool {
        self.interaction.tool()
    }

    pub fn label(&self) -> CellLabel {
        self.label
    }

    pub fn cursor(&self) -> Cursor {
        self.interaction.cursor()
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.store.annotations()
    }

    /// Vertices of the polygon under construction.
    pub fn polygon(&self) -> &[ImagePoint] {
        self.interaction.polygon()
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.image.as_ref().map(|image| &image.info)
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image.as_ref().map(|image| image.info.id)
    }

    /// Whether the open image is shown as a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.image.as_ref().is_some_and(|image| image.placeholder)
    }

    /// Placement of the open image in the current viewport.
    pub fn fit(&self) -> Option<ImageFit> {
        let image = self.image.as_ref()?;
        ImageFit::compute(image.info.dimensions(), self.viewport)
    }

    /// Image coordinate under a viewport position.
    pub fn image_coord_at(&self, x: f64, y: f64) -> Option<ImagePoint> {
        let fit = self.fit()?;
        Some(self.view.viewport_to_image(&fit, x, y))
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::None => {}
            Command::Redraw => self.needs_redraw = true,
            Command::Create(request) => {
                let kind = request.kind();
                match self.store.create(&self.backend, &request).await {
                    Ok(mutation) => {
                        self.notices
                            .push_back(Notice::success(format!("Saved {} {}", request.label, kind)));
                        if let Some(e) = mutation.reload_error {
                            self.report("Saved, but failed to reload annotations", e);
                        }
                        self.refresh_statistics().await;
                    }
                    Err(e) => {
                        self.report("Failed to save annotation", e);
                    }
                }
                self.needs_redraw = true;
            }
            Command::Delete(id) => {
                match self.store.delete(&self.backend, id).await {
                    Ok(mutation) => {
                        self.notices.push_back(Notice::success("Annotation deleted"));
                        if let Some(e) = mutation.reload_error {
                            self.report("Deleted, but failed to reload annotations", e);
                        }
                        self.refresh_statistics().await;
                    }
                    Err(e) => {
                        self.report("Failed to delete annotation", e);
                    }
                }
                self.needs_redraw = true;
            }
        }
    }

    /// Log a failure and queue it as an error notice.
    fn report(&mut self, context: &str, error: EditorError) -> EditorError {
        log::warn!("{}: {}", context, error);
        self.notices
            .push_back(Notice::error(format!("{}: {}", context, error)));
        error
    }
}

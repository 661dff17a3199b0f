//! Tool modes and the pointer gesture state machine.
//!
//! The state machine is synchronous: it updates the view transform and the
//! in-progress polygon directly and describes store mutations as a
//! [`Command`] for the session to carry out against the persistence layer.

use crate::config::InteractionConfig;
use crate::geometry::{self, ImagePoint};
use crate::model::{Annotation, AnnotationId, CellLabel, Geometry, MIN_POLYGON_VERTICES, NewAnnotation};
use crate::view::{DragAnchor, ImageFit, ViewTransform};
use serde::{Deserialize, Serialize};

/// Editing tools available in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Drag to move the view
    #[default]
    Pan,
    /// Click to place a point marker
    Point,
    /// Click vertices; clicking near the first vertex closes the ring
    Polygon,
    /// Click an annotation to remove it
    Delete,
}

impl Tool {
    /// Get the display name for this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Pan => "Pan",
            Tool::Point => "Point",
            Tool::Polygon => "Polygon",
            Tool::Delete => "Delete",
        }
    }

    /// Get all available tools.
    pub fn all() -> &'static [Tool] {
        &[Tool::Pan, Tool::Point, Tool::Polygon, Tool::Delete]
    }

    /// Cursor shown while the tool is idle.
    pub fn idle_cursor(&self) -> Cursor {
        match self {
            Tool::Pan => Cursor::Grab,
            Tool::Delete => Cursor::NotAllowed,
            Tool::Point | Tool::Polygon => Cursor::Crosshair,
        }
    }
}

/// Pointer cursor the host should display over the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Grab,
    Grabbing,
    Crosshair,
    NotAllowed,
}

impl Cursor {
    /// CSS cursor keyword.
    pub fn css_name(&self) -> &'static str {
        match self {
            Cursor::Grab => "grab",
            Cursor::Grabbing => "grabbing",
            Cursor::Crosshair => "crosshair",
            Cursor::NotAllowed => "not-allowed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Gesture {
    #[default]
    Idle,
    Dragging(DragAnchor),
}

/// What the session has to do after a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Nothing changed.
    None,
    /// Local view state changed; redraw.
    Redraw,
    /// Persist a new annotation, then reload.
    Create(NewAnnotation),
    /// Delete an annotation, then reload.
    Delete(AnnotationId),
}

/// Read-only view of the canvas a pointer event lands on.
#[derive(Debug, Clone, Copy)]
pub struct Canvas<'a> {
    /// Image placement, `None` while no image is open.
    pub fit: Option<ImageFit>,
    /// Annotations in store order.
    pub annotations: &'a [Annotation],
    /// Label for new annotations.
    pub label: CellLabel,
}

/// Tool mode plus in-progress gesture state.
#[derive(Debug, Clone)]
pub struct InteractionState {
    tool: Tool,
    gesture: Gesture,
    polygon: Vec<ImagePoint>,
    thresholds: InteractionConfig,
}

impl InteractionState {
    pub fn new(tool: Tool, thresholds: InteractionConfig) -> Self {
        Self {
            tool,
            gesture: Gesture::Idle,
            polygon: Vec::new(),
            thresholds,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::Dragging(_))
    }

    /// Vertices of the polygon under construction.
    pub fn polygon(&self) -> &[ImagePoint] {
        &self.polygon
    }

    pub fn cursor(&self) -> Cursor {
        match self.gesture {
            Gesture::Dragging(_) => Cursor::Grabbing,
            Gesture::Idle => self.tool.idle_cursor(),
        }
    }

    pub fn thresholds(&self) -> &InteractionConfig {
        &self.thresholds
    }

    /// Switch tools. Any partial polygon and drag are discarded.
    pub fn set_tool(&mut self, tool: Tool) {
        if !self.polygon.is_empty() {
            log::debug!("Discarding {} polygon vertices on tool change", self.polygon.len());
        }
        self.tool = tool;
        self.polygon.clear();
        self.gesture = Gesture::Idle;
        log::debug!("Tool: {}", tool.name());
    }

    /// Discard the polygon under construction. Returns whether anything was discarded.
    pub fn cancel_polygon(&mut self) -> bool {
        let had_points = !self.polygon.is_empty();
        self.polygon.clear();
        had_points
    }

    /// Reset gesture state when another image is opened.
    pub fn clear_for_image_change(&mut self) {
        self.polygon.clear();
        self.gesture = Gesture::Idle;
    }

    /// Handle a primary-button press at a viewport position.
    pub fn pointer_down(
        &mut self,
        x: f64,
        y: f64,
        view: &mut ViewTransform,
        canvas: &Canvas<'_>,
    ) -> Command {
        if self.tool == Tool::Pan {
            self.gesture = Gesture::Dragging(view.begin_drag(x, y));
            log::debug!("Pan drag started at ({:.1}, {:.1})", x, y);
            return Command::None;
        }

        let Some(fit) = canvas.fit else {
            log::debug!("Ignoring {} click without an open image", self.tool.name());
            return Command::None;
        };
        let point = view.viewport_to_image(&fit, x, y);

        match self.tool {
            Tool::Pan => Command::None,
            Tool::Point => Command::Create(NewAnnotation::point(canvas.label, point)),
            Tool::Polygon => self.place_polygon_vertex(point, canvas.label),
            Tool::Delete => match hit_test(canvas.annotations, point, self.thresholds.point_delete_radius) {
                Some(id) => Command::Delete(id),
                None => {
                    log::debug!("Delete click at ({}, {}) hit nothing", point.x, point.y);
                    Command::None
                }
            },
        }
    }

    /// Handle pointer motion; only pan drags react.
    pub fn pointer_move(&mut self, x: f64, y: f64, view: &mut ViewTransform) -> Command {
        match self.gesture {
            Gesture::Dragging(anchor) => {
                view.drag_to(anchor, x, y);
                Command::Redraw
            }
            Gesture::Idle => Command::None,
        }
    }

    /// Handle a primary-button release.
    pub fn pointer_up(&mut self) -> Command {
        if self.is_dragging() {
            log::debug!("Pan drag ended");
        }
        self.gesture = Gesture::Idle;
        Command::None
    }

    /// Zoom about the cursor; works in every tool and gesture state.
    pub fn wheel(&self, x: f64, y: f64, delta_y: f64, view: &mut ViewTransform) -> Command {
        let factor = if delta_y > 0.0 {
            self.thresholds.wheel_zoom_out
        } else {
            self.thresholds.wheel_zoom_in
        };
        view.zoom(factor, Some((x, y)));
        Command::Redraw
    }

    /// Append a vertex, or close the ring when `point` lands near the first
    /// vertex.
    ///
    /// Closing needs three vertices before the click, and the closing click
    /// is not appended. A near click on a two-vertex ring that would reach
    /// three points only with the click itself is kept as a vertex.
    fn place_polygon_vertex(&mut self, point: ImagePoint, label: CellLabel) -> Command {
        let closes = self.polygon.len() >= MIN_POLYGON_VERTICES
            && self
                .polygon
                .first()
                .is_some_and(|first| first.distance_to(&point) < self.thresholds.polygon_close_distance);

        if !closes {
            self.polygon.push(point);
            log::debug!("Polygon vertex {} at ({}, {})", self.polygon.len(), point.x, point.y);
            return Command::Redraw;
        }

        // The closing click snaps onto the first vertex and is not itself a vertex.
        let vertices = std::mem::take(&mut self.polygon);
        match NewAnnotation::polygon(label, vertices) {
            Ok(request) => {
                log::debug!(
                    "Polygon closed with {} vertices, area {:.1}",
                    request.geometry.vertices().len(),
                    request.area.unwrap_or_default()
                );
                Command::Create(request)
            }
            Err(e) => {
                log::error!("Closed polygon failed validation: {}", e);
                Command::Redraw
            }
        }
    }
}

/// First annotation in store order under an image point.
///
/// Points hit within `point_radius`; polygons hit when they contain the point.
pub fn hit_test(annotations: &[Annotation], at: ImagePoint, point_radius: f64) -> Option<AnnotationId> {
    annotations
        .iter()
        .find(|annotation| match &annotation.geometry {
            Geometry::Point(p) => geometry::distance(*p, at) < point_radius,
            Geometry::Polygon(ring) => geometry::point_in_polygon(at, ring),
        })
        .map(|annotation| annotation.id)
}

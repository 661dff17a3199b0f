use super::*;
use crate::backend::{Detection, LocalBackend, PresetDetector, WorkspaceDocument};
use crate::model::{
    AnnotationId, AnnotationKind, AnnotationRecord, Geometry, LabelCount, NewAnnotation, Origin,
};
use image::{Rgba, RgbaImage};
use pollster::block_on;
use std::cell::Cell;

/// Session over a white image of `width`x`height`, shown in a viewport of the
/// same size so viewport and image coordinates coincide.
fn open_session(backend: &LocalBackend, width: u32, height: u32) -> EditorSession<&LocalBackend> {
    let info = backend.add_pixels(
        "slide.png",
        RgbaImage::from_pixel(width, height, Rgba([0xff, 0xff, 0xff, 0xff])),
    );
    let mut session = EditorSession::new(
        backend,
        EditorConfig::default(),
        Viewport::new(f64::from(width), f64::from(height)),
    );
    block_on(session.open_image(info.id)).unwrap();
    session.take_notices();
    session
}

fn click(session: &mut EditorSession<&LocalBackend>, x: f64, y: f64) {
    block_on(session.click(x, y));
}

#[test]
fn test_point_click_updates_statistics() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 100);
    session.set_tool(Tool::Point);
    session.set_label(CellLabel::Tumor);

    click(&mut session, 100.0, 50.0);

    assert_eq!(session.annotations().len(), 1);
    assert_eq!(
        session.annotations()[0].geometry,
        Geometry::Point(ImagePoint::new(100, 50))
    );
    let stats = session.statistics().unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(
        stats.by_label,
        vec![LabelCount {
            label: CellLabel::Tumor,
            count: 1
        }]
    );
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
}

#[test]
fn test_delete_radius() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 100, 100);
    session.set_tool(Tool::Point);
    click(&mut session, 50.0, 50.0);
    assert_eq!(session.annotations().len(), 1);

    session.set_tool(Tool::Delete);
    click(&mut session, 70.0, 70.0);
    assert_eq!(session.annotations().len(), 1);

    click(&mut session, 58.0, 58.0);
    assert!(session.annotations().is_empty());
    assert_eq!(session.statistics().unwrap().total, 0);
}

#[test]
fn test_delete_removes_at_most_one() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 100, 100);
    session.set_tool(Tool::Point);
    click(&mut session, 50.0, 50.0);
    click(&mut session, 52.0, 50.0);

    session.set_tool(Tool::Delete);
    click(&mut session, 51.0, 50.0);
    assert_eq!(session.annotations().len(), 1);
}

#[test]
fn test_polygon_closes_near_first_vertex() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Polygon);
    session.set_label(CellLabel::Stromal);

    click(&mut session, 0.0, 0.0);
    click(&mut session, 100.0, 0.0);
    click(&mut session, 100.0, 100.0);
    assert_eq!(session.polygon().len(), 3);
    assert!(session.annotations().is_empty());

    click(&mut session, 2.0, 2.0);
    assert!(session.polygon().is_empty());
    assert_eq!(session.annotations().len(), 1);

    let polygon = &session.annotations()[0];
    assert_eq!(polygon.kind(), AnnotationKind::Polygon);
    assert_eq!(
        polygon.geometry.vertices(),
        &[
            ImagePoint::new(0, 0),
            ImagePoint::new(100, 0),
            ImagePoint::new(100, 100)
        ]
    );
    assert_eq!(polygon.area, Some(5000.0));
    assert_eq!(polygon.label, CellLabel::Stromal);
}

#[test]
fn test_far_click_adds_a_vertex() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Polygon);

    click(&mut session, 0.0, 0.0);
    click(&mut session, 100.0, 0.0);
    click(&mut session, 100.0, 100.0);
    click(&mut session, 0.0, 50.0);

    assert_eq!(session.polygon().len(), 4);
    assert!(session.annotations().is_empty());
}

#[test]
fn test_early_click_near_first_vertex_is_a_vertex() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Polygon);

    click(&mut session, 0.0, 0.0);
    click(&mut session, 100.0, 0.0);
    click(&mut session, 3.0, 3.0);

    assert_eq!(session.polygon().len(), 3);
    assert!(session.annotations().is_empty());
}

#[test]
fn test_failed_polygon_save_clears_polygon_and_keeps_store() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Point);
    click(&mut session, 150.0, 150.0);
    session.take_notices();

    session.set_tool(Tool::Polygon);
    click(&mut session, 0.0, 0.0);
    click(&mut session, 100.0, 0.0);
    click(&mut session, 100.0, 100.0);

    backend.set_offline(true);
    click(&mut session, 1.0, 1.0);

    assert!(session.polygon().is_empty());
    assert_eq!(session.annotations().len(), 1);
    assert_eq!(session.annotations()[0].kind(), AnnotationKind::Point);

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[test]
fn test_tool_change_discards_polygon_and_drag() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Polygon);
    click(&mut session, 10.0, 10.0);
    click(&mut session, 50.0, 10.0);
    assert_eq!(session.polygon().len(), 2);

    session.set_tool(Tool::Pan);
    assert!(session.polygon().is_empty());

    block_on(session.pointer_down(10.0, 10.0));
    assert_eq!(session.cursor(), Cursor::Grabbing);
    session.set_tool(Tool::Point);
    assert_eq!(session.cursor(), Cursor::Crosshair);

    // The drag ended with the tool change.
    session.pointer_move(90.0, 90.0);
    assert_eq!(session.view().translate(), (0.0, 0.0));
}

#[test]
fn test_cancel_polygon() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    session.set_tool(Tool::Polygon);
    click(&mut session, 10.0, 10.0);
    session.cancel_polygon();
    assert!(session.polygon().is_empty());
    assert_eq!(session.tool(), Tool::Polygon);
}

#[test]
fn test_pan_drag_moves_view() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 200);
    assert_eq!(session.tool(), Tool::Pan);
    assert_eq!(session.cursor(), Cursor::Grab);

    block_on(session.pointer_down(20.0, 30.0));
    session.pointer_move(50.0, 70.0);
    session.pointer_up();

    assert_eq!(session.view().translate(), (30.0, 40.0));
    assert_eq!(session.cursor(), Cursor::Grab);
    assert!(session.annotations().is_empty());
}

#[test]
fn test_wheel_keeps_point_under_cursor() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 400, 300);
    let before = session.image_coord_at(120.0, 80.0).unwrap();

    session.wheel(120.0, 80.0, -1.0);
    session.wheel(120.0, 80.0, -1.0);
    assert!(session.view().scale() > 1.0);
    assert_eq!(session.image_coord_at(120.0, 80.0).unwrap(), before);

    session.wheel(120.0, 80.0, 3.0);
    assert_eq!(session.image_coord_at(120.0, 80.0).unwrap(), before);
}

#[test]
fn test_zoom_buttons_and_reset() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 100, 100);
    session.zoom_in();
    assert!((session.view().scale() - 1.2).abs() < 1e-9);
    session.zoom_out();
    assert!((session.view().scale() - 0.96).abs() < 1e-9);
    session.reset_view();
    assert_eq!(*session.view(), ViewTransform::identity());
}

#[test]
fn test_clicks_without_image_are_ignored() {
    let backend = LocalBackend::new();
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));
    session.set_tool(Tool::Point);
    click(&mut session, 10.0, 10.0);
    session.set_tool(Tool::Polygon);
    click(&mut session, 10.0, 10.0);

    assert!(session.annotations().is_empty());
    assert!(session.polygon().is_empty());
    assert!(session.take_notices().is_empty());
}

#[test]
fn test_open_unknown_image_reports_error() {
    let backend = LocalBackend::new();
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));
    let err = block_on(session.open_image(12)).unwrap_err();
    assert!(matches!(err, EditorError::NotFound { .. }));
    assert!(session.image_info().is_none());

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[test]
fn test_missing_pixels_fall_back_to_placeholder() {
    let backend = LocalBackend::new();
    let info = backend.add_image("remote.tif", 40, 20);
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(40.0, 20.0));
    block_on(session.open_image(info.id)).unwrap();

    assert!(session.is_placeholder());
    let notices = session.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Info);

    let pixmap = session.render().unwrap();
    let color = pixmap.pixel(0, 0).unwrap().demultiply();
    let [r, g, b] = crate::constants::placeholder::START;
    assert_eq!((color.red(), color.green(), color.blue()), (r, g, b));
}

#[test]
fn test_opening_another_image_resets_state() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 100, 100);
    session.set_tool(Tool::Point);
    click(&mut session, 10.0, 10.0);
    session.set_tool(Tool::Polygon);
    click(&mut session, 20.0, 20.0);
    session.zoom_in();

    let other = backend.add_pixels("other.png", RgbaImage::new(50, 50));
    block_on(session.open_image(other.id)).unwrap();

    assert!(session.annotations().is_empty());
    assert!(session.polygon().is_empty());
    assert_eq!(*session.view(), ViewTransform::identity());
    assert_eq!(session.statistics().unwrap().total, 0);
    assert_eq!(session.image_id(), Some(other.id));
}

#[test]
fn test_detection_reloads_store() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 200, 100);
    let detector = PresetDetector::new(
        &backend,
        vec![
            Detection {
                label: "tumor".to_string(),
                x: 50.0,
                y: 50.0,
                confidence: 0.9,
            },
            Detection {
                label: "plasma".to_string(),
                x: 10.0,
                y: 20.0,
                confidence: 0.4,
            },
        ],
    );

    let report = block_on(session.detect(&detector)).unwrap();
    assert_eq!(report.detected_count, 2);
    assert_eq!(session.annotations().len(), 2);

    // Newest first.
    assert_eq!(
        session.annotations()[0].geometry,
        Geometry::Point(ImagePoint::new(20, 20))
    );
    assert_eq!(session.annotations()[0].label, CellLabel::Other);
    assert_eq!(session.statistics().unwrap().count_for(CellLabel::Tumor), 1);
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Success);
}

#[test]
fn test_detection_without_image() {
    let backend = LocalBackend::new();
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));
    let detector = PresetDetector::new(&backend, Vec::new());
    assert!(matches!(
        block_on(session.detect(&detector)),
        Err(EditorError::NoImageOpen)
    ));
}

#[test]
fn test_render_marks_frame_clean() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 64, 48);
    assert!(session.needs_redraw());
    let pixmap = session.render().unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (64, 48));
    assert!(!session.needs_redraw());

    session.wheel(10.0, 10.0, -1.0);
    assert!(session.needs_redraw());
}

#[test]
fn test_letterboxed_click_maps_to_image_space() {
    let backend = LocalBackend::new();
    let info = backend.add_pixels("wide.png", RgbaImage::new(200, 100));
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));
    block_on(session.open_image(info.id)).unwrap();
    session.set_tool(Tool::Point);

    // Drawn at 100x50, offset 25 from the top.
    click(&mut session, 50.0, 50.0);
    assert_eq!(
        session.annotations()[0].geometry,
        Geometry::Point(ImagePoint::new(100, 50))
    );
}

/// Local backend whose annotation listing can be taken down on its own.
struct ListingOutage<'a> {
    inner: &'a LocalBackend,
    down: Cell<bool>,
}

impl<'a> ListingOutage<'a> {
    fn new(inner: &'a LocalBackend) -> Self {
        Self {
            inner,
            down: Cell::new(false),
        }
    }
}

impl AnnotationBackend for ListingOutage<'_> {
    async fn image_info(&self, image: ImageId) -> Result<ImageInfo> {
        self.inner.image_info(image).await
    }

    async fn list_annotations(&self, image: ImageId) -> Result<Vec<AnnotationRecord>> {
        if self.down.get() {
            return Err(EditorError::transport("listing unavailable"));
        }
        self.inner.list_annotations(image).await
    }

    async fn create_annotation(&self, image: ImageId, annotation: &NewAnnotation) -> Result<AnnotationRecord> {
        self.inner.create_annotation(image, annotation).await
    }

    async fn delete_annotation(&self, id: AnnotationId) -> Result<()> {
        self.inner.delete_annotation(id).await
    }

    async fn statistics(&self, image: ImageId) -> Result<Statistics> {
        self.inner.statistics(image).await
    }
}

impl ImageProvider for ListingOutage<'_> {
    async fn fetch_image(&self, image: ImageId) -> Result<image::RgbaImage> {
        self.inner.fetch_image(image).await
    }
}

/// Stores one cell, then loses the connection.
struct DroppingDetector<'a> {
    backend: &'a LocalBackend,
}

impl Detector for DroppingDetector<'_> {
    async fn detect(&self, image: ImageId) -> Result<DetectionReport> {
        let request =
            NewAnnotation::point(CellLabel::Tumor, ImagePoint::new(5, 5)).with_origin(Origin::Model);
        self.backend.create_annotation(image, &request).await?;
        Err(EditorError::transport("detector connection dropped"))
    }
}

#[test]
fn test_malformed_workspace_keeps_image_editable() {
    let document = WorkspaceDocument {
        next_image_id: 2,
        next_annotation_id: 2,
        images: vec![ImageInfo {
            id: 1,
            original_name: "slide.png".to_string(),
            width: 100,
            height: 100,
            path: None,
        }],
        annotations: vec![AnnotationRecord {
            id: 1,
            image_id: 1,
            annotation_type: AnnotationKind::Point,
            label: Some("tumor".to_string()),
            coordinates: "[{\"x\":".to_string(),
            area: None,
            confidence: None,
            created_by: Origin::User,
        }],
        ..WorkspaceDocument::default()
    };
    let backend = LocalBackend::from_document(document).unwrap();
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));

    let err = block_on(session.open_image(1)).unwrap_err();
    assert!(matches!(err, EditorError::Parse(_)));
    assert_eq!(session.image_id(), Some(1));
    assert!(session.annotations().is_empty());
    session.take_notices();

    block_on(backend.delete_annotation(1)).unwrap();
    session.set_tool(Tool::Point);
    click(&mut session, 40.0, 60.0);

    assert_eq!(session.annotations().len(), 1);
    assert_eq!(
        session.annotations()[0].geometry,
        Geometry::Point(ImagePoint::new(40, 60))
    );
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
}

#[test]
fn test_saved_annotation_survives_failed_reload() {
    let local = LocalBackend::new();
    let info = local.add_pixels("slide.png", RgbaImage::new(100, 100));
    let backend = ListingOutage::new(&local);
    let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));
    block_on(session.open_image(info.id)).unwrap();
    session.take_notices();
    session.set_tool(Tool::Point);

    backend.down.set(true);
    block_on(session.click(20.0, 20.0));

    // Stored upstream, but the mirror still shows the previous snapshot.
    assert!(session.annotations().is_empty());
    assert_eq!(local.to_document().annotations.len(), 1);
    assert_eq!(session.statistics().unwrap().total, 1);

    let notices = session.take_notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[1].level, NoticeLevel::Error);
    assert!(notices[1].message.starts_with("Saved, but failed to reload"));

    backend.down.set(false);
    block_on(session.click(80.0, 80.0));
    assert_eq!(session.annotations().len(), 2);

    backend.down.set(true);
    session.set_tool(Tool::Delete);
    block_on(session.click(20.0, 20.0));
    assert_eq!(local.to_document().annotations.len(), 1);
    assert_eq!(session.annotations().len(), 2);

    let notices = session.take_notices();
    let levels: Vec<_> = notices.iter().map(|notice| notice.level).collect();
    assert_eq!(
        levels,
        vec![NoticeLevel::Success, NoticeLevel::Success, NoticeLevel::Error]
    );
    assert!(notices[2].message.starts_with("Deleted, but failed to reload"));
}

#[test]
fn test_failed_detection_still_reloads() {
    let backend = LocalBackend::new();
    let mut session = open_session(&backend, 100, 100);
    let detector = DroppingDetector { backend: &backend };

    let err = block_on(session.detect(&detector)).unwrap_err();
    assert!(matches!(err, EditorError::Transport { .. }));
    assert_eq!(session.annotations().len(), 1);
    assert_eq!(session.annotations()[0].origin, Origin::Model);
    assert_eq!(session.statistics().unwrap().total, 1);

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

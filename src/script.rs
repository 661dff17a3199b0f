//! Recorded gesture scripts replayed against a session.
//!
//! A script is a JSON array of steps tagged by `action`:
//!
//! ```json
//! [
//!   {"action": "tool", "tool": "polygon"},
//!   {"action": "label", "label": "tumor"},
//!   {"action": "click", "x": 10, "y": 10},
//!   {"action": "wheel", "x": 50, "y": 50, "delta_y": -1}
//! ]
//! ```

use crate::backend::{AnnotationBackend, Detection, ImageProvider, PresetDetector};
use crate::error::Result;
use crate::interaction::Tool;
use crate::model::{CellLabel, ImageId};
use crate::session::{EditorSession, Notice};
use serde::{Deserialize, Serialize};

/// One recorded input event or toolbar action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    Open {
        image: ImageId,
    },
    Tool {
        tool: Tool,
    },
    Label {
        label: CellLabel,
    },
    Down {
        x: f64,
        y: f64,
    },
    Move {
        x: f64,
        y: f64,
    },
    Up,
    Click {
        x: f64,
        y: f64,
    },
    Wheel {
        x: f64,
        y: f64,
        delta_y: f64,
    },
    ZoomIn,
    ZoomOut,
    ResetView,
    CancelPolygon,
    /// Commit detections, given either as a list or as raw model output.
    Detect {
        #[serde(default)]
        detections: Vec<Detection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
}

/// Parse a JSON script.
pub fn parse_script(json: &str) -> Result<Vec<ScriptStep>> {
    Ok(serde_json::from_str(json)?)
}

/// Replay steps in order and collect every notice they raised.
///
/// Failing steps don't stop the replay; their errors show up as notices.
pub async fn run_script<B>(session: &mut EditorSession<B>, steps: &[ScriptStep]) -> Vec<Notice>
where
    B: AnnotationBackend + ImageProvider + Clone,
{
    let mut notices = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        log::debug!("Step {}: {:?}", index, step);
        match step {
            ScriptStep::Open { image } => {
                let _ = session.open_image(*image).await;
            }
            ScriptStep::Tool { tool } => session.set_tool(*tool),
            ScriptStep::Label { label } => session.set_label(*label),
            ScriptStep::Down { x, y } => session.pointer_down(*x, *y).await,
            ScriptStep::Move { x, y } => session.pointer_move(*x, *y),
            ScriptStep::Up => session.pointer_up(),
            ScriptStep::Click { x, y } => session.click(*x, *y).await,
            ScriptStep::Wheel { x, y, delta_y } => session.wheel(*x, *y, *delta_y),
            ScriptStep::ZoomIn => session.zoom_in(),
            ScriptStep::ZoomOut => session.zoom_out(),
            ScriptStep::ResetView => session.reset_view(),
            ScriptStep::CancelPolygon => session.cancel_polygon(),
            ScriptStep::Detect {
                detections,
                response,
            } => {
                let backend = session.backend().clone();
                let detector = match response {
                    Some(text) => match PresetDetector::from_response(backend, text) {
                        Ok(detector) => detector,
                        Err(e) => {
                            log::warn!("Step {}: unreadable detector response: {}", index, e);
                            notices.push(Notice::error(format!("Detection failed: {}", e)));
                            continue;
                        }
                    },
                    None => PresetDetector::new(backend, detections.clone()),
                };
                let _ = session.detect(&detector).await;
            }
        }
        notices.extend(session.take_notices());
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::config::EditorConfig;
    use crate::geometry::ImagePoint;
    use crate::model::{AnnotationKind, Geometry};
    use crate::session::NoticeLevel;
    use crate::view::Viewport;
    use pollster::block_on;

    const SCRIPT: &str = r#"[
        {"action": "tool", "tool": "polygon"},
        {"action": "label", "label": "tumor"},
        {"action": "click", "x": 0, "y": 0},
        {"action": "click", "x": 100, "y": 0},
        {"action": "click", "x": 100, "y": 100},
        {"action": "click", "x": 2, "y": 2},
        {"action": "tool", "tool": "point"},
        {"action": "label", "label": "lymphocyte"},
        {"action": "click", "x": 150, "y": 150},
        {"action": "zoom_in"},
        {"action": "reset_view"}
    ]"#;

    #[test]
    fn test_parse_script() {
        let steps = parse_script(SCRIPT).unwrap();
        assert_eq!(steps.len(), 11);
        assert_eq!(steps[0], ScriptStep::Tool { tool: Tool::Polygon });
        assert_eq!(steps[2], ScriptStep::Click { x: 0.0, y: 0.0 });
        assert_eq!(steps[9], ScriptStep::ZoomIn);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(parse_script(r#"[{"action": "teleport"}]"#).is_err());
    }

    #[test]
    fn test_replay_creates_annotations() {
        let backend = LocalBackend::new();
        let image = backend.add_image("slide.png", 200, 200);
        let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(200.0, 200.0));
        block_on(session.open_image(image.id)).unwrap();
        session.take_notices();

        let notices = block_on(run_script(&mut session, &parse_script(SCRIPT).unwrap()));
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Success));

        let annotations = session.annotations();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].geometry, Geometry::Point(ImagePoint::new(150, 150)));
        assert_eq!(annotations[1].kind(), AnnotationKind::Polygon);
        assert_eq!(annotations[1].label, CellLabel::Tumor);
    }

    #[test]
    fn test_replay_open_and_detect_response() {
        let backend = LocalBackend::new();
        let image = backend.add_image("slide.png", 100, 100);
        let mut session = EditorSession::new(&backend, EditorConfig::default(), Viewport::new(100.0, 100.0));

        let steps = vec![
            ScriptStep::Open { image: image.id },
            ScriptStep::Detect {
                detections: Vec::new(),
                response: Some(r#"Found: [{"type": "eosinophil", "x": 30, "y": 40, "confidence": 0.7}]"#.to_string()),
            },
            ScriptStep::Detect {
                detections: Vec::new(),
                response: Some("nothing here".to_string()),
            },
        ];
        let notices = block_on(run_script(&mut session, &steps));

        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.annotations()[0].label, CellLabel::Eosinophil);
        assert_eq!(notices.last().unwrap().level, NoticeLevel::Error);
    }
}

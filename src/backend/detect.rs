//! Detection results and a detector that replays a fixed set of them.

use super::{AnnotationBackend, Detector};
use crate::error::{EditorError, Result};
use crate::geometry::ImagePoint;
use crate::model::{AnnotationRecord, CellLabel, ImageId, NewAnnotation, Origin};
use serde::{Deserialize, Serialize};

/// A single detected cell, positioned in percent of the image size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub label: String,
    /// Horizontal position, 0..100
    pub x: f64,
    /// Vertical position, 0..100
    pub y: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Detection {
    /// Point annotation for an image of the given size.
    pub fn to_annotation(&self, width: u32, height: u32) -> Result<NewAnnotation> {
        if !(self.x.is_finite() && self.y.is_finite()) {
            return Err(EditorError::validation(format!(
                "detection position ({}, {}) is not a number",
                self.x, self.y
            )));
        }
        let at = ImagePoint::rounded(
            self.x / 100.0 * f64::from(width),
            self.y / 100.0 * f64::from(height),
        );
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(NewAnnotation::point(CellLabel::from_upstream(Some(self.label.as_str())), at)
            .with_confidence(confidence)
            .with_origin(Origin::Model))
    }
}

/// Outcome of a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub detected_count: usize,
    pub annotations: Vec<AnnotationRecord>,
}

/// Extract the detection list from a model response.
///
/// Responses may wrap the JSON array in prose; everything from the first `[`
/// to the last `]` is parsed.
pub fn parse_detections(text: &str) -> Result<Vec<Detection>> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(EditorError::validation("detector response contains no JSON array"));
    };
    if end < start {
        return Err(EditorError::validation("detector response contains no JSON array"));
    }
    Ok(serde_json::from_str(&text[start..=end])?)
}

/// Detector that persists a known list of detections through a backend.
pub struct PresetDetector<B> {
    backend: B,
    detections: Vec<Detection>,
}

impl<B: AnnotationBackend> PresetDetector<B> {
    pub fn new(backend: B, detections: Vec<Detection>) -> Self {
        Self {
            backend,
            detections,
        }
    }

    /// Build from raw model output.
    pub fn from_response(backend: B, text: &str) -> Result<Self> {
        Ok(Self::new(backend, parse_detections(text)?))
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }
}

impl<B: AnnotationBackend> Detector for PresetDetector<B> {
    async fn detect(&self, image: ImageId) -> Result<DetectionReport> {
        let info = self.backend.image_info(image).await?;

        // Validate every detection before storing any of them.
        let requests = self
            .detections
            .iter()
            .map(|detection| detection.to_annotation(info.width, info.height))
            .collect::<Result<Vec<_>>>()?;

        let mut annotations = Vec::with_capacity(requests.len());
        for request in &requests {
            annotations.push(self.backend.create_annotation(image, request).await?);
        }

        log::info!(
            "Detected {} cells on image {}",
            annotations.len(),
            image
        );
        Ok(DetectionReport {
            detected_count: annotations.len(),
            annotations,
        })
    }
}

//! Annotation types and their wire representation.

use crate::error::{EditorError, Result};
use crate::geometry::{self, ImagePoint};
use crate::model::CellLabel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for an annotation, assigned by the persistence layer.
pub type AnnotationId = u64;

/// Unique identifier for an image, assigned by the persistence layer.
pub type ImageId = u64;

/// Minimum number of vertices required for a valid polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Shape kind of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Point,
    Polygon,
}

impl AnnotationKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Point => "point",
            AnnotationKind::Polygon => "polygon",
        }
    }
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Placed by hand in the editor
    #[default]
    User,
    /// Produced by automated detection
    Model,
}

/// Shape data for an annotation (in image coordinates).
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Single cell marker.
    Point(ImagePoint),
    /// Closed ring; the last vertex connects back to the first.
    Polygon(Vec<ImagePoint>),
}

/// Coordinates as they appear on the wire. Fractional values are tolerated
/// and rounded, since detections are computed from percentages.
#[derive(Deserialize)]
struct WirePoint {
    x: f64,
    y: f64,
}

impl Geometry {
    /// The kind tag matching this geometry.
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Geometry::Point(_) => AnnotationKind::Point,
            Geometry::Polygon(_) => AnnotationKind::Polygon,
        }
    }

    /// Vertices in ring order; a point yields a single vertex.
    pub fn vertices(&self) -> &[ImagePoint] {
        match self {
            Geometry::Point(p) => std::slice::from_ref(p),
            Geometry::Polygon(vertices) => vertices,
        }
    }

    /// Check the length invariant for the geometry's kind.
    pub fn validate(&self) -> Result<()> {
        match self {
            Geometry::Point(_) => Ok(()),
            Geometry::Polygon(vertices) if vertices.len() >= MIN_POLYGON_VERTICES => Ok(()),
            Geometry::Polygon(vertices) => Err(EditorError::validation(format!(
                "polygon needs at least {} vertices, got {}",
                MIN_POLYGON_VERTICES,
                vertices.len()
            ))),
        }
    }

    /// Encode the vertices as the JSON text stored upstream.
    pub fn to_coordinates_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self.vertices())?)
    }

    /// Parse coordinate text for the given kind and validate it.
    pub fn from_coordinates_json(kind: AnnotationKind, text: &str) -> Result<Self> {
        let wire: Vec<WirePoint> = serde_json::from_str(text)?;
        let mut points: Vec<ImagePoint> = wire
            .into_iter()
            .map(|p| ImagePoint::rounded(p.x, p.y))
            .collect();

        let geometry = match kind {
            AnnotationKind::Point => {
                if points.len() != 1 {
                    return Err(EditorError::validation(format!(
                        "point needs exactly one coordinate, got {}",
                        points.len()
                    )));
                }
                Geometry::Point(points.remove(0))
            }
            AnnotationKind::Polygon => Geometry::Polygon(points),
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

/// An annotation that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub label: CellLabel,
    pub geometry: Geometry,
    /// Precomputed polygon area in square pixels.
    pub area: Option<f64>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    pub origin: Origin,
}

impl NewAnnotation {
    /// A hand-placed point marker.
    pub fn point(label: CellLabel, at: ImagePoint) -> Self {
        Self {
            label,
            geometry: Geometry::Point(at),
            area: None,
            confidence: None,
            origin: Origin::User,
        }
    }

    /// A hand-drawn polygon; the area is computed from the ring.
    pub fn polygon(label: CellLabel, vertices: Vec<ImagePoint>) -> Result<Self> {
        let geometry = Geometry::Polygon(vertices);
        geometry.validate()?;
        let area = geometry::polygon_area(geometry.vertices());
        Ok(Self {
            label,
            geometry,
            area: Some(area),
            confidence: None,
            origin: Origin::User,
        })
    }

    /// Attach a detection confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set the origin tag.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Check every invariant a persisted annotation must satisfy.
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(EditorError::validation(format!(
                    "confidence {} outside [0, 1]",
                    confidence
                )));
            }
        }
        if self.area.is_some() && self.geometry.kind() == AnnotationKind::Point {
            return Err(EditorError::validation("area is only defined for polygons"));
        }
        Ok(())
    }

    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }
}

/// A persisted annotation with structured geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub label: CellLabel,
    pub geometry: Geometry,
    pub area: Option<f64>,
    pub confidence: Option<f64>,
    pub origin: Origin,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }
}

impl TryFrom<&AnnotationRecord> for Annotation {
    type Error = EditorError;

    fn try_from(record: &AnnotationRecord) -> Result<Self> {
        let geometry = Geometry::from_coordinates_json(record.annotation_type, &record.coordinates)?;
        Ok(Self {
            id: record.id,
            label: CellLabel::from_upstream(record.label.as_deref()),
            geometry,
            area: record.area,
            confidence: record.confidence,
            origin: record.created_by,
        })
    }
}

/// An annotation row as exchanged with the persistence collaborator.
///
/// Geometry travels as JSON text in `coordinates` and is only parsed when the
/// record is turned into an [`Annotation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub annotation_type: AnnotationKind,
    #[serde(default)]
    pub label: Option<String>,
    pub coordinates: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub created_by: Origin,
}

impl AnnotationRecord {
    /// Build the stored row for a validated request.
    pub fn from_request(id: AnnotationId, image_id: ImageId, request: &NewAnnotation) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            id,
            image_id,
            annotation_type: request.kind(),
            label: Some(request.label.as_str().to_string()),
            coordinates: request.geometry.to_coordinates_json()?,
            area: request.area,
            confidence: request.confidence,
            created_by: request.origin,
        })
    }

    /// Label with unknown names folded into `other`.
    pub fn cell_label(&self) -> CellLabel {
        CellLabel::from_upstream(self.label.as_deref())
    }
}

/// Metadata for an image known to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: ImageId,
    pub original_name: String,
    pub width: u32,
    pub height: u32,
    /// Source file the pixels are decoded from, when stored locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ImageInfo {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

//! Data models for annotations, labels and statistics.

mod annotation;
mod label;
mod statistics;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationRecord, Geometry, ImageId, ImageInfo,
    MIN_POLYGON_VERTICES, NewAnnotation, Origin,
};
pub use label::CellLabel;
pub use statistics::{KindCount, LabelCount, Statistics};

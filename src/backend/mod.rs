//! Contracts for the collaborators the editor talks to.
//!
//! The engine never owns persistence, image storage or detection. It reaches
//! them through the traits below, which are transport-agnostic: a local JSON
//! workspace ([`LocalBackend`]) ships with the crate, and an HTTP client or a
//! database adapter can implement the same traits.

mod detect;
mod local;

pub use detect::{Detection, DetectionReport, PresetDetector, parse_detections};
pub use local::{ExportDocument, LocalBackend, WORKSPACE_VERSION, WorkspaceDocument};

use crate::error::Result;
use crate::model::{AnnotationId, AnnotationRecord, ImageId, ImageInfo, NewAnnotation, Statistics};
use image::RgbaImage;
use std::future::Future;

/// Persistence for annotations and image metadata.
pub trait AnnotationBackend {
    /// Metadata of an image; `NotFound` when it doesn't exist.
    fn image_info(&self, image: ImageId) -> impl Future<Output = Result<ImageInfo>>;

    /// Every annotation on an image, newest first.
    fn list_annotations(&self, image: ImageId) -> impl Future<Output = Result<Vec<AnnotationRecord>>>;

    /// Persist a new annotation and return the stored row.
    fn create_annotation(
        &self,
        image: ImageId,
        annotation: &NewAnnotation,
    ) -> impl Future<Output = Result<AnnotationRecord>>;

    /// Remove an annotation.
    fn delete_annotation(&self, id: AnnotationId) -> impl Future<Output = Result<()>>;

    /// Label and kind counts for an image.
    fn statistics(&self, image: ImageId) -> impl Future<Output = Result<Statistics>>;
}

/// Source of decoded image pixels.
pub trait ImageProvider {
    fn fetch_image(&self, image: ImageId) -> impl Future<Output = Result<RgbaImage>>;
}

/// Automated cell detection. Detected cells are persisted by the detector;
/// the editor only reloads afterwards.
pub trait Detector {
    fn detect(&self, image: ImageId) -> impl Future<Output = Result<DetectionReport>>;
}

// Shared references let a session and a detector use the same backend.
impl<T: AnnotationBackend> AnnotationBackend for &T {
    fn image_info(&self, image: ImageId) -> impl Future<Output = Result<ImageInfo>> {
        (**self).image_info(image)
    }

    fn list_annotations(&self, image: ImageId) -> impl Future<Output = Result<Vec<AnnotationRecord>>> {
        (**self).list_annotations(image)
    }

    fn create_annotation(
        &self,
        image: ImageId,
        annotation: &NewAnnotation,
    ) -> impl Future<Output = Result<AnnotationRecord>> {
        (**self).create_annotation(image, annotation)
    }

    fn delete_annotation(&self, id: AnnotationId) -> impl Future<Output = Result<()>> {
        (**self).delete_annotation(id)
    }

    fn statistics(&self, image: ImageId) -> impl Future<Output = Result<Statistics>> {
        (**self).statistics(image)
    }
}

impl<T: ImageProvider> ImageProvider for &T {
    fn fetch_image(&self, image: ImageId) -> impl Future<Output = Result<RgbaImage>> {
        (**self).fetch_image(image)
    }
}

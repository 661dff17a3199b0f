//! Error types for the annotation engine and its collaborators.

use crate::model::{AnnotationId, ImageId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while editing annotations.
#[derive(Error, Debug)]
pub enum EditorError {
    /// Image or annotation absent upstream
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up
        resource: Resource,
    },

    /// Geometry or metadata that violates the annotation invariants
    #[error("Invalid annotation: {message}")]
    Validation {
        /// Description of the violated invariant
        message: String,
    },

    /// Collaborator unreachable or returned a non-success response
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// Coordinate text or another JSON payload could not be parsed
    #[error("Parse failure: {0}")]
    Parse(#[from] serde_json::Error),

    /// An operation needed an open image but none is loaded
    #[error("No image is open")]
    NoImageOpen,

    /// Image decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while reading or writing a workspace
    #[error("IO error at {path:?}: {source}")]
    Io {
        /// File that was being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// The kind of record a [`EditorError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Image(ImageId),
    Annotation(AnnotationId),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Image(id) => write!(f, "Image {}", id),
            Resource::Annotation(id) => write!(f, "Annotation {}", id),
        }
    }
}

impl EditorError {
    /// Create a not-found error for an image.
    pub fn image_not_found(id: ImageId) -> Self {
        Self::NotFound {
            resource: Resource::Image(id),
        }
    }

    /// Create a not-found error for an annotation.
    pub fn annotation_not_found(id: AnnotationId) -> Self {
        Self::NotFound {
            resource: Resource::Annotation(id),
        }
    }

    /// Create a validation error with a message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transport error with a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = EditorError> = std::result::Result<T, E>;

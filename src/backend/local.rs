//! In-process workspace backed by a JSON document on disk.

use super::{AnnotationBackend, ImageProvider};
use crate::error::{EditorError, Result};
use crate::model::{
    AnnotationId, AnnotationRecord, ImageId, ImageInfo, NewAnnotation, Statistics,
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

/// Current workspace file format version.
pub const WORKSPACE_VERSION: u32 = 1;

/// Serialized form of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    pub version: u32,
    pub next_image_id: ImageId,
    pub next_annotation_id: AnnotationId,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

impl Default for WorkspaceDocument {
    fn default() -> Self {
        Self {
            version: WORKSPACE_VERSION,
            next_image_id: 1,
            next_annotation_id: 1,
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

/// Image metadata plus every annotation on it, as handed out for download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub image: ImageInfo,
    pub annotations: Vec<AnnotationRecord>,
    pub export_date: String,
}

/// Local persistence and image provider.
///
/// All state lives behind `RefCell`s: the editor is single-threaded and no
/// borrow is held across an await point.
#[derive(Debug, Default)]
pub struct LocalBackend {
    document: RefCell<WorkspaceDocument>,
    pixels: RefCell<HashMap<ImageId, RgbaImage>>,
    offline: Cell<bool>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing document.
    pub fn from_document(document: WorkspaceDocument) -> Result<Self> {
        if document.version > WORKSPACE_VERSION {
            return Err(EditorError::validation(format!(
                "workspace version {} is newer than supported version {}",
                document.version, WORKSPACE_VERSION
            )));
        }
        Ok(Self {
            document: RefCell::new(document),
            ..Self::default()
        })
    }

    /// Read a workspace file.
    pub fn open(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EditorError::io(path, e))?;
        let document: WorkspaceDocument = serde_json::from_str(&json)?;
        log::info!(
            "Opened workspace {:?}: {} images, {} annotations",
            path,
            document.images.len(),
            document.annotations.len()
        );
        Self::from_document(document)
    }

    /// Read a workspace file, or start an empty one if it doesn't exist yet.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            log::info!("Creating new workspace at {:?}", path);
            Ok(Self::new())
        }
    }

    /// Write the workspace to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.document.borrow())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EditorError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| EditorError::io(path, e))?;
        log::info!("Saved workspace to {:?}", path);
        Ok(())
    }

    /// Snapshot of the current document.
    pub fn to_document(&self) -> WorkspaceDocument {
        self.document.borrow().clone()
    }

    /// Register an image by metadata only.
    pub fn add_image(&self, original_name: impl Into<String>, width: u32, height: u32) -> ImageInfo {
        let mut document = self.document.borrow_mut();
        let info = ImageInfo {
            id: document.next_image_id,
            original_name: original_name.into(),
            width,
            height,
            path: None,
        };
        document.next_image_id += 1;
        document.images.push(info.clone());
        log::debug!("Registered image {} ({}x{})", info.id, width, height);
        info
    }

    /// Register an in-memory image; its pixels are served directly.
    pub fn add_pixels(&self, original_name: impl Into<String>, pixels: RgbaImage) -> ImageInfo {
        let info = self.add_image(original_name, pixels.width(), pixels.height());
        self.pixels.borrow_mut().insert(info.id, pixels);
        info
    }

    /// Register an image file; dimensions are read from its header.
    pub fn import_image(&self, path: &Path) -> Result<ImageInfo> {
        let (width, height) = image::image_dimensions(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut info = self.add_image(name, width, height);
        info.path = Some(path.to_path_buf());
        if let Some(entry) = self
            .document
            .borrow_mut()
            .images
            .iter_mut()
            .find(|entry| entry.id == info.id)
        {
            entry.path = info.path.clone();
        }
        log::info!("Imported {:?} as image {}", path, info.id);
        Ok(info)
    }

    /// All registered images in registration order.
    pub fn images(&self) -> Vec<ImageInfo> {
        self.document.borrow().images.clone()
    }

    /// Simulate an unreachable collaborator: every call fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Image metadata with all of its annotations.
    pub fn export(&self, image: ImageId) -> Result<ExportDocument> {
        let document = self.document.borrow();
        let info = find_image(&document, image)?.clone();
        let annotations = document
            .annotations
            .iter()
            .filter(|record| record.image_id == image)
            .cloned()
            .collect();
        Ok(ExportDocument {
            image: info,
            annotations,
            export_date: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.get() {
            Err(EditorError::transport("workspace is offline"))
        } else {
            Ok(())
        }
    }
}

fn find_image(document: &WorkspaceDocument, image: ImageId) -> Result<&ImageInfo> {
    document
        .images
        .iter()
        .find(|info| info.id == image)
        .ok_or_else(|| EditorError::image_not_found(image))
}

impl AnnotationBackend for LocalBackend {
    async fn image_info(&self, image: ImageId) -> Result<ImageInfo> {
        self.check_online()?;
        let document = self.document.borrow();
        find_image(&document, image).cloned()
    }

    async fn list_annotations(&self, image: ImageId) -> Result<Vec<AnnotationRecord>> {
        self.check_online()?;
        let document = self.document.borrow();
        find_image(&document, image)?;

        let mut records: Vec<AnnotationRecord> = document
            .annotations
            .iter()
            .filter(|record| record.image_id == image)
            .cloned()
            .collect();
        // Ids grow with creation time, so this is newest first.
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    async fn create_annotation(&self, image: ImageId, annotation: &NewAnnotation) -> Result<AnnotationRecord> {
        self.check_online()?;
        let mut document = self.document.borrow_mut();
        find_image(&document, image)?;

        let record = AnnotationRecord::from_request(document.next_annotation_id, image, annotation)?;
        document.next_annotation_id += 1;
        document.annotations.push(record.clone());
        log::debug!(
            "Stored {} annotation {} on image {}",
            record.annotation_type,
            record.id,
            image
        );
        Ok(record)
    }

    async fn delete_annotation(&self, id: AnnotationId) -> Result<()> {
        self.check_online()?;
        let mut document = self.document.borrow_mut();
        let index = document
            .annotations
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| EditorError::annotation_not_found(id))?;
        document.annotations.remove(index);
        log::debug!("Removed annotation {}", id);
        Ok(())
    }

    async fn statistics(&self, image: ImageId) -> Result<Statistics> {
        self.check_online()?;
        let document = self.document.borrow();
        find_image(&document, image)?;
        Ok(Statistics::from_records(
            document.annotations.iter().filter(|record| record.image_id == image),
        ))
    }
}

impl ImageProvider for LocalBackend {
    async fn fetch_image(&self, image: ImageId) -> Result<RgbaImage> {
        self.check_online()?;
        if let Some(pixels) = self.pixels.borrow().get(&image) {
            return Ok(pixels.clone());
        }

        let info = {
            let document = self.document.borrow();
            find_image(&document, image)?.clone()
        };
        let Some(path) = info.path.as_deref() else {
            return Err(EditorError::transport(format!(
                "image {} has no pixel source",
                image
            )));
        };

        let decoded = image::open(path)?.to_rgba8();
        if decoded.dimensions() != info.dimensions() {
            log::warn!(
                "Image {:?} is {}x{} but was registered as {}x{}",
                path,
                decoded.width(),
                decoded.height(),
                info.width,
                info.height
            );
        }
        self.pixels.borrow_mut().insert(image, decoded.clone());
        Ok(decoded)
    }
}

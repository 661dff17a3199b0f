//! Client-side mirror of the annotations on the open image.
//!
//! The store is read-only between loads: every mutation goes to the backend
//! first and is followed by a full reload.

use crate::backend::AnnotationBackend;
use crate::error::{EditorError, Result};
use crate::model::{Annotation, AnnotationId, AnnotationRecord, ImageId, NewAnnotation};

/// Sequence number handed out when a reload starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

/// A mutation that reached the backend.
///
/// `reload_error` is set when the follow-up reload failed; the store then
/// still holds the snapshot from before the mutation.
#[derive(Debug)]
#[must_use]
pub struct Mutation<T> {
    pub value: T,
    pub reload_error: Option<EditorError>,
}

/// Annotations of one image in backend order.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    image: Option<ImageId>,
    annotations: Vec<Annotation>,
    issued: u64,
    applied: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image the current contents belong to.
    pub fn image(&self) -> Option<ImageId> {
        self.image
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    /// Drop all contents, e.g. when the open image goes away.
    pub fn clear(&mut self) {
        self.image = None;
        self.annotations.clear();
    }

    /// Empty the store and bind it to `image`, ahead of loading it.
    pub fn clear_for(&mut self, image: ImageId) {
        self.image = Some(image);
        self.annotations.clear();
    }

    /// Start a reload. Snapshots must be applied with the ticket they were
    /// requested under.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.issued += 1;
        ReloadTicket(self.issued)
    }

    /// Replace the contents with a snapshot fetched under `ticket`.
    ///
    /// Returns `Ok(false)` when a newer snapshot has already been applied.
    /// Malformed records fail the whole snapshot and leave the store as it was.
    pub fn apply_snapshot(
        &mut self,
        ticket: ReloadTicket,
        image: ImageId,
        records: &[AnnotationRecord],
    ) -> Result<bool> {
        if ticket.0 <= self.applied {
            log::debug!(
                "Discarding stale snapshot {} (already applied {})",
                ticket.0,
                self.applied
            );
            return Ok(false);
        }

        let annotations = records
            .iter()
            .map(Annotation::try_from)
            .collect::<Result<Vec<_>>>()?;

        self.applied = ticket.0;
        self.image = Some(image);
        self.annotations = annotations;
        Ok(true)
    }

    /// Replace the contents with everything the backend has for `image`.
    pub async fn load<B: AnnotationBackend>(&mut self, backend: &B, image: ImageId) -> Result<()> {
        let ticket = self.begin_reload();
        let records = backend.list_annotations(image).await?;
        if self.apply_snapshot(ticket, image, &records)? {
            log::info!("Loaded {} annotations for image {}", self.annotations.len(), image);
        }
        Ok(())
    }

    /// Persist a new annotation on the current image, then reload.
    ///
    /// `Err` means nothing was stored.
    pub async fn create<B: AnnotationBackend>(
        &mut self,
        backend: &B,
        request: &NewAnnotation,
    ) -> Result<Mutation<AnnotationRecord>> {
        let image = self.image.ok_or(EditorError::NoImageOpen)?;
        let record = backend.create_annotation(image, request).await?;
        log::info!(
            "Created {} annotation {} ({})",
            record.annotation_type,
            record.id,
            request.label
        );
        Ok(self.reload_after(backend, image, record).await)
    }

    /// Delete an annotation, then reload.
    ///
    /// `Err` means nothing was deleted.
    pub async fn delete<B: AnnotationBackend>(
        &mut self,
        backend: &B,
        id: AnnotationId,
    ) -> Result<Mutation<()>> {
        let image = self.image.ok_or(EditorError::NoImageOpen)?;
        backend.delete_annotation(id).await?;
        log::info!("Deleted annotation {}", id);
        Ok(self.reload_after(backend, image, ()).await)
    }

    async fn reload_after<B: AnnotationBackend, T>(
        &mut self,
        backend: &B,
        image: ImageId,
        value: T,
    ) -> Mutation<T> {
        let reload_error = match self.load(backend, image).await {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Reload of image {} after a mutation failed: {}", image, e);
                Some(e)
            }
        };
        Mutation {
            value,
            reload_error,
        }
    }
}

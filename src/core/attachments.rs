//! # Attachment Store
//!
//! Files the user selected for the next message, plus the references the
//! backend issued for them.
//!
//! ```text
//! AttachmentStore
//! ├── attachments: Vec<Attachment>            // selection order, unique (name, size)
//! ├── references:  Vec<AttachmentReference>   // upload order, appended per batch
//! └── removed_in_flight: Vec<(LocalId, String)> // removed while uploading
//! ```
//!
//! References only carry the file name, so correlating a reference with its
//! attachment is a join on a non-unique key. Removal therefore drops the
//! first reference with a matching name.

use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::api::types::AttachmentReference;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Content types the backend can extract text from.
pub const ACCEPTED_MIME_TYPES: [&str; 2] = [PDF_MIME, DOCX_MIME];

pub fn is_accepted(mime_type: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mime_type)
}

/// Guesses a content type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => PDF_MIME,
        Some("docx") => DOCX_MIME,
        _ => FALLBACK_MIME,
    }
}

/// A file offered by the user, not yet accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Reads a local file. The name is the final path component.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
            .to_string();
        Ok(Self::new(name, mime_for_path(path), data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Identity assigned when a file is accepted. Stable across uploads and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(Uuid);

impl LocalId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Uploaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub local_id: LocalId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: Arc<[u8]>,
    pub status: UploadStatus,
}

impl Attachment {
    fn accept(file: CandidateFile) -> Self {
        Self {
            local_id: LocalId::new(),
            size: file.size(),
            name: file.name,
            mime_type: file.mime_type,
            data: file.data,
            status: UploadStatus::Uploading,
        }
    }

    fn same_file(&self, name: &str, size: u64) -> bool {
        self.name == name && self.size == size
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentStore {
    attachments: Vec<Attachment>,
    references: Vec<AttachmentReference>,
    /// Files removed before their upload finished; their references are
    /// discarded when the batch result arrives.
    removed_in_flight: Vec<(LocalId, String)>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn references(&self) -> &[AttachmentReference] {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Accepts allow-listed files that are not already pending.
    ///
    /// Returns the newly accepted attachments; only these need uploading.
    /// Rejected content types are dropped silently.
    pub fn add(&mut self, files: Vec<CandidateFile>) -> Vec<Attachment> {
        let mut accepted = Vec::new();
        for file in files {
            if !is_accepted(&file.mime_type) {
                debug!("Ignoring {} ({})", file.name, file.mime_type);
                continue;
            }
            if self
                .attachments
                .iter()
                .any(|a| a.same_file(&file.name, file.size()))
            {
                debug!("Ignoring duplicate {} ({} bytes)", file.name, file.size());
                continue;
            }
            let attachment = Attachment::accept(file);
            self.attachments.push(attachment.clone());
            accepted.push(attachment);
        }
        accepted
    }

    /// Removes the attachment at `index`. If it was uploaded, the first
    /// reference with the same name goes with it.
    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index >= self.attachments.len() {
            warn!(
                "Attachment index {} out of range ({} pending)",
                index,
                self.attachments.len()
            );
            return None;
        }
        let removed = self.attachments.remove(index);
        match removed.status {
            // No reference yet; the late one is discarded by `record_upload`.
            UploadStatus::Uploading => {
                self.removed_in_flight
                    .push((removed.local_id, removed.name.clone()));
                debug!("Removed {} during upload", removed.name);
            }
            UploadStatus::Failed => debug!("Removed {} (no reference issued)", removed.name),
            // First match wins when several references share a name.
            UploadStatus::Uploaded => {
                match self.references.iter().position(|r| r.name == removed.name) {
                    Some(pos) => {
                        let reference = self.references.remove(pos);
                        debug!("Removed {} with reference {}", removed.name, reference.id);
                    }
                    None => warn!("Removed {} but found no reference by that name", removed.name),
                }
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.attachments.clear();
        self.references.clear();
        self.removed_in_flight.clear();
    }

    pub fn clear_references(&mut self) {
        self.references.clear();
    }

    /// Snapshots and clears both lists.
    pub fn take(&mut self) -> (Vec<Attachment>, Vec<AttachmentReference>) {
        (
            std::mem::take(&mut self.attachments),
            std::mem::take(&mut self.references),
        )
    }

    /// Records a successful upload of `batch`.
    ///
    /// References are appended, never replaced. For each file of the batch
    /// removed while the upload was in flight, the first reference with its
    /// name is dropped.
    pub fn record_upload(&mut self, batch: &[LocalId], mut references: Vec<AttachmentReference>) {
        self.set_status(batch, UploadStatus::Uploaded);
        for name in self.settle_removed(batch) {
            match references.iter().position(|r| r.name == name) {
                Some(pos) => {
                    let reference = references.remove(pos);
                    warn!(
                        "Dropping reference {} for {}: removed during upload",
                        reference.id, reference.name
                    );
                }
                None => debug!("No reference issued for removed {}", name),
            }
        }
        self.references.extend(references);
    }

    /// Marks `batch` as failed. Nothing is removed.
    pub fn record_upload_failure(&mut self, batch: &[LocalId]) {
        self.set_status(batch, UploadStatus::Failed);
        self.settle_removed(batch);
    }

    pub fn mark_uploading(&mut self, batch: &[LocalId]) {
        self.set_status(batch, UploadStatus::Uploading);
    }

    /// Attachments whose last upload failed.
    pub fn failed(&self) -> Vec<Attachment> {
        self.attachments
            .iter()
            .filter(|a| a.status == UploadStatus::Failed)
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.name.as_str()).collect()
    }

    /// Forgets the in-flight removals belonging to `batch`, returning their names.
    fn settle_removed(&mut self, batch: &[LocalId]) -> Vec<String> {
        let (settled, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.removed_in_flight)
            .into_iter()
            .partition(|(id, _)| batch.contains(id));
        self.removed_in_flight = pending;
        settled.into_iter().map(|(_, name)| name).collect()
    }

    fn set_status(&mut self, batch: &[LocalId], status: UploadStatus) {
        for attachment in self
            .attachments
            .iter_mut()
            .filter(|a| batch.contains(&a.local_id))
        {
            attachment.status = status;
        }
    }
}

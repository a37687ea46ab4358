//! Attachment state and the reducer that keeps it in step with the form.
//!
//! [`UploadState::apply`] is the only place attachments change, and it writes
//! the matching form field in the same call. Callers hold one lock over both
//! the state and the [`FormValues`], so neither side is ever observed without
//! the other.

use bazaar_api_client::MultipartFile;
use bazaar_core::UploadTarget;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::UploadError;
use crate::form::{list_urls_of, scalar_url_of, FormValues};

/// Raw bytes of a picked file, kept for local previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_multipart(&self) -> MultipartFile {
        let file = MultipartFile::new(self.name.clone(), self.bytes.clone());
        match &self.content_type {
            Some(content_type) => file.with_content_type(content_type.clone()),
            None => file,
        }
    }
}

/// Identity of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UploadTicket(Uuid);

impl UploadTicket {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UploadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPhase {
    /// Present on the loaded record: URL, no local file.
    Hydrated,
    /// Picked, upload not yet dispatched.
    Selected,
    /// Upload request in flight.
    Uploading,
    /// Uploaded this session: URL and local file.
    Committed,
}

#[derive(Debug, Clone)]
pub struct InFlightUpload {
    pub ticket: UploadTicket,
    pub file: LocalFile,
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedAttachment {
    /// `None` when the attachment came from the loaded record.
    pub file: Option<LocalFile>,
    pub url: String,
}

impl CommittedAttachment {
    pub fn phase(&self) -> AttachmentPhase {
        if self.file.is_some() {
            AttachmentPhase::Committed
        } else {
            AttachmentPhase::Hydrated
        }
    }
}

/// Render-ready view of one attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub name: Option<String>,
    pub url: Option<String>,
    pub phase: AttachmentPhase,
    #[serde(skip)]
    pub preview: Option<LocalFile>,
}

/// An upload to dispatch for an admitted file.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub ticket: UploadTicket,
    pub file: LocalFile,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Hydrate { record: Value },
    Select { files: Vec<LocalFile> },
    Started { ticket: UploadTicket },
    Succeeded { ticket: UploadTicket, url: String },
    Failed { ticket: UploadTicket, error: String },
    RemoveCommitted { url: String },
    RemoveInFlight { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Hydrated(usize),
    Admitted(Vec<UploadTicket>),
    Started,
    Committed(String),
    Abandoned,
    /// Event for an upload that was superseded or removed.
    Discarded,
    Removed,
}

/// Attachment state for one upload target.
#[derive(Debug, Clone)]
pub struct UploadState {
    target: UploadTarget,
    committed: Vec<CommittedAttachment>,
    in_flight: Vec<InFlightUpload>,
}

impl UploadState {
    pub fn new(target: UploadTarget) -> Self {
        Self {
            target,
            committed: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub fn committed(&self) -> &[CommittedAttachment] {
        &self.committed
    }

    pub fn in_flight(&self) -> &[InFlightUpload] {
        &self.in_flight
    }

    pub fn is_uploading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Attachments counted against the limit: committed plus in flight.
    pub fn count(&self) -> usize {
        self.committed.len() + self.in_flight.len()
    }

    pub fn attachments(&self) -> Vec<AttachmentView> {
        let committed = self.committed.iter().map(|a| AttachmentView {
            name: a.file.as_ref().map(|f| f.name.clone()),
            url: Some(a.url.clone()),
            phase: a.phase(),
            preview: a.file.clone(),
        });
        let pending = self.in_flight.iter().map(|u| AttachmentView {
            name: Some(u.file.name.clone()),
            url: None,
            phase: if u.started {
                AttachmentPhase::Uploading
            } else {
                AttachmentPhase::Selected
            },
            preview: Some(u.file.clone()),
        });
        committed.chain(pending).collect()
    }

    /// Whether committed URLs and the form field agree.
    pub fn is_consistent_with(&self, form: &FormValues) -> bool {
        let urls: Vec<String> = self.committed.iter().map(|a| a.url.clone()).collect();
        match &self.target {
            UploadTarget::List { field, .. } => form.list_urls(field) == urls,
            UploadTarget::Scalar { field } => form.scalar_url(field) == urls.first().cloned(),
        }
    }

    /// Apply one event to the attachments and the form field together.
    ///
    /// Returns an error only for rejected selections and unknown removals;
    /// completions for tickets no longer tracked are [`Outcome::Discarded`].
    pub fn apply(
        &mut self,
        form: &mut FormValues,
        event: UploadEvent,
    ) -> Result<(Outcome, Vec<UploadJob>), UploadError> {
        match event {
            UploadEvent::Hydrate { record } => Ok((self.hydrate(form, &record), Vec::new())),
            UploadEvent::Select { files } => self.select(form, files),
            UploadEvent::Started { ticket } => {
                let outcome = match self.in_flight.iter_mut().find(|u| u.ticket == ticket) {
                    Some(upload) => {
                        upload.started = true;
                        Outcome::Started
                    }
                    None => Outcome::Discarded,
                };
                Ok((outcome, Vec::new()))
            }
            UploadEvent::Succeeded { ticket, url } => Ok((self.commit(form, ticket, url), Vec::new())),
            UploadEvent::Failed { ticket, error } => {
                let outcome = match self.take_in_flight(ticket) {
                    Some(upload) => {
                        tracing::debug!(
                            file_name = %upload.file.name,
                            error = %error,
                            "Upload abandoned"
                        );
                        Outcome::Abandoned
                    }
                    None => Outcome::Discarded,
                };
                Ok((outcome, Vec::new()))
            }
            UploadEvent::RemoveCommitted { url } => {
                self.remove_committed(form, &url)?;
                Ok((Outcome::Removed, Vec::new()))
            }
            UploadEvent::RemoveInFlight { name } => {
                let index = self
                    .in_flight
                    .iter()
                    .position(|u| u.file.name == name)
                    .ok_or_else(|| UploadError::NotFound(name.clone()))?;
                self.in_flight.remove(index);
                Ok((Outcome::Removed, Vec::new()))
            }
        }
    }

    fn hydrate(&mut self, form: &mut FormValues, record: &Value) -> Outcome {
        let field = self.target.field().to_string();
        let value = record.get(&field);

        // The field is rewritten only when it reads differently from the record.
        self.in_flight.clear();
        self.committed = match &self.target {
            UploadTarget::List { .. } => {
                let urls = list_urls_of(value);
                if form.list_urls(&field) != urls {
                    form.set_list_urls(&field, urls.clone());
                }
                urls
            }
            UploadTarget::Scalar { .. } => {
                let url = scalar_url_of(value);
                if form.scalar_url(&field) != url {
                    form.set_scalar_url(&field, url.clone());
                }
                url.into_iter().collect()
            }
        }
        .into_iter()
        .map(|url| CommittedAttachment { file: None, url })
        .collect();

        Outcome::Hydrated(self.committed.len())
    }

    fn select(
        &mut self,
        form: &mut FormValues,
        files: Vec<LocalFile>,
    ) -> Result<(Outcome, Vec<UploadJob>), UploadError> {
        if files.is_empty() {
            return Err(UploadError::EmptySelection);
        }

        match &self.target {
            UploadTarget::List { max_files, .. } => {
                let current = self.count();
                if let Some(max) = *max_files {
                    if current + files.len() > max {
                        return Err(UploadError::TooManyFiles {
                            max,
                            current,
                            requested: files.len(),
                        });
                    }
                }
            }
            UploadTarget::Scalar { field } => {
                if files.len() > 1 {
                    return Err(UploadError::TooManyFiles {
                        max: 1,
                        current: 0,
                        requested: files.len(),
                    });
                }
                // Latest selection replaces whatever the slot held.
                for superseded in self.in_flight.drain(..) {
                    tracing::debug!(
                        file_name = %superseded.file.name,
                        ticket = %superseded.ticket,
                        "Upload superseded by new selection"
                    );
                }
                self.committed.clear();
                form.set_scalar_url(field, None);
            }
        }

        let jobs: Vec<UploadJob> = files
            .into_iter()
            .map(|file| UploadJob {
                ticket: UploadTicket::new(),
                file,
            })
            .collect();

        self.in_flight.extend(jobs.iter().map(|job| InFlightUpload {
            ticket: job.ticket,
            file: job.file.clone(),
            started: false,
        }));

        let tickets = jobs.iter().map(|job| job.ticket).collect();
        Ok((Outcome::Admitted(tickets), jobs))
    }

    fn commit(&mut self, form: &mut FormValues, ticket: UploadTicket, url: String) -> Outcome {
        let Some(upload) = self.take_in_flight(ticket) else {
            tracing::debug!(ticket = %ticket, "Completion for untracked upload discarded");
            return Outcome::Discarded;
        };

        let attachment = CommittedAttachment {
            file: Some(upload.file),
            url: url.clone(),
        };
        match &self.target {
            UploadTarget::List { field, .. } => {
                self.committed.push(attachment);
                form.update_list(field, |urls| urls.push(url.clone()));
            }
            UploadTarget::Scalar { field } => {
                self.committed = vec![attachment];
                form.set_scalar_url(field, Some(url.clone()));
            }
        }

        Outcome::Committed(url)
    }

    fn remove_committed(&mut self, form: &mut FormValues, url: &str) -> Result<(), UploadError> {
        let index = self
            .committed
            .iter()
            .position(|a| a.url == url)
            .ok_or_else(|| UploadError::NotFound(url.to_string()))?;
        self.committed.remove(index);

        match &self.target {
            UploadTarget::List { field, .. } => form.update_list(field, |urls| {
                if let Some(pos) = urls.iter().position(|u| u == url) {
                    urls.remove(pos);
                }
            }),
            UploadTarget::Scalar { field } => form.set_scalar_url(field, None),
        }
        Ok(())
    }

    fn take_in_flight(&mut self, ticket: UploadTicket) -> Option<InFlightUpload> {
        let index = self.in_flight.iter().position(|u| u.ticket == ticket)?;
        Some(self.in_flight.remove(index))
    }
}

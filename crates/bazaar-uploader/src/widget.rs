//! File upload widget.
//!
//! Wraps an [`UploadState`] and the form it writes into behind one mutex, and
//! drives the uploads for admitted files. A selection's uploads all run
//! concurrently; each completion is merged into the form value as it is at
//! completion time.

use std::sync::{Arc, Mutex, MutexGuard};

use bazaar_core::{AcceptFilter, UploadTarget};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::UploadError;
use crate::form::FormValues;
use crate::state::{AttachmentView, LocalFile, Outcome, UploadEvent, UploadJob, UploadState};
use crate::Uploader;

/// What a subscriber renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploaderSnapshot {
    pub attachments: Vec<AttachmentView>,
    pub uploading: bool,
    /// Current value of the target field.
    pub value: Value,
}

/// Result of one selection's uploads.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub committed: Vec<String>,
    pub failed: Vec<UploadError>,
    /// Completions dropped because the upload was superseded, removed or the
    /// widget was closed.
    pub discarded: usize,
}

#[derive(Debug)]
struct Inner {
    state: UploadState,
    form: FormValues,
    closed: bool,
}

/// Upload widget bound to one form field.
pub struct FileUploader<U> {
    uploader: Arc<U>,
    inner: Arc<Mutex<Inner>>,
    accept: AcceptFilter,
    snapshots: Arc<watch::Sender<UploaderSnapshot>>,
}

impl<U> Clone for FileUploader<U> {
    fn clone(&self) -> Self {
        Self {
            uploader: self.uploader.clone(),
            inner: self.inner.clone(),
            accept: self.accept.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<U: Uploader> FileUploader<U> {
    /// Widget over `form`, seeded from the target field's current value.
    pub fn new(target: UploadTarget, form: FormValues, uploader: Arc<U>) -> Self {
        let mut state = UploadState::new(target);
        let mut form = form;
        let seed = form.to_value();
        // Hydrating from the form itself cannot fail.
        let _ = state.apply(&mut form, UploadEvent::Hydrate { record: seed });

        let snapshot = snapshot_of(&state, &form);
        let (tx, _rx) = watch::channel(snapshot);

        Self {
            uploader,
            inner: Arc::new(Mutex::new(Inner {
                state,
                form,
                closed: false,
            })),
            accept: AcceptFilter::default(),
            snapshots: Arc::new(tx),
        }
    }

    pub fn with_accept(mut self, accept: AcceptFilter) -> Self {
        self.accept = accept;
        self
    }

    /// Advisory file-type filter for the caller's file picker.
    pub fn accept(&self) -> &AcceptFilter {
        &self.accept
    }

    /// Whether the picker filter matches `file`. Selections are not checked
    /// against it.
    pub fn accepts(&self, file: &LocalFile) -> bool {
        self.accept.accepts(&file.name, file.content_type.as_deref())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply one event under the lock and publish the resulting snapshot.
    fn dispatch(&self, event: UploadEvent) -> Result<(Outcome, Vec<UploadJob>), UploadError> {
        let mut inner = self.lock();
        apply_locked(&mut inner, &self.snapshots, event)
    }

    /// Re-seed the widget from a loaded record. Returns the number of
    /// attachments found.
    pub fn hydrate(&self, record: &Value) -> Result<usize, UploadError> {
        let (outcome, _) = self.dispatch(UploadEvent::Hydrate {
            record: record.clone(),
        })?;
        match outcome {
            Outcome::Hydrated(count) => Ok(count),
            _ => Ok(0),
        }
    }

    /// Admit a selection without uploading it. All-or-nothing against the
    /// count limit.
    pub fn admit(&self, files: Vec<LocalFile>) -> Result<Vec<UploadJob>, UploadError> {
        let requested = files.len();
        match self.dispatch(UploadEvent::Select { files }) {
            Ok((_, jobs)) => {
                tracing::debug!(count = jobs.len(), "Files admitted for upload");
                Ok(jobs)
            }
            Err(e) => {
                if let UploadError::TooManyFiles { max, current, .. } = &e {
                    tracing::warn!(max, current, requested, "File selection rejected");
                }
                Err(e)
            }
        }
    }

    /// Admit a selection and upload every file concurrently.
    ///
    /// Fails only if the selection is rejected; individual upload failures are
    /// reported in the [`BatchReport`] and do not affect sibling uploads.
    pub async fn select_files(&self, files: Vec<LocalFile>) -> Result<BatchReport, UploadError> {
        let jobs = self.admit(files)?;
        Ok(self.run(jobs).await)
    }

    /// Run admitted uploads concurrently.
    pub async fn run(&self, jobs: Vec<UploadJob>) -> BatchReport {
        let results = join_all(jobs.into_iter().map(|job| self.run_job(job))).await;

        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(Some(url)) => report.committed.push(url),
                Ok(None) => report.discarded += 1,
                Err(e) => report.failed.push(e),
            }
        }
        report
    }

    /// `Ok(None)` when the completion was discarded.
    async fn run_job(&self, job: UploadJob) -> Result<Option<String>, UploadError> {
        let UploadJob { ticket, file } = job;
        let _ = self.dispatch(UploadEvent::Started { ticket });
        tracing::debug!(file_name = %file.name, size = file.size(), "Upload started");

        let result = self.uploader.upload(&file).await;

        match result {
            Ok(url) => match self.dispatch(UploadEvent::Succeeded {
                ticket,
                url: url.clone(),
            }) {
                Ok((Outcome::Committed(url), _)) => {
                    tracing::info!(file_name = %file.name, url = %url, "Upload committed");
                    Ok(Some(url))
                }
                _ => Ok(None),
            },
            Err(source) => {
                tracing::error!(file_name = %file.name, error = %source, "Upload failed");
                match self.dispatch(UploadEvent::Failed {
                    ticket,
                    error: source.to_string(),
                }) {
                    Ok((Outcome::Abandoned, _)) => Err(UploadError::Upload {
                        file_name: file.name,
                        source,
                    }),
                    _ => Ok(None),
                }
            }
        }
    }

    /// Remove an attachment by identity: URL for committed attachments, file
    /// name for uploads still in flight.
    pub fn remove(&self, identity: &str) -> Result<(), UploadError> {
        let mut inner = self.lock();
        let is_committed = inner.state.committed().iter().any(|a| a.url == identity);

        let event = if is_committed {
            UploadEvent::RemoveCommitted {
                url: identity.to_string(),
            }
        } else {
            UploadEvent::RemoveInFlight {
                name: identity.to_string(),
            }
        };
        apply_locked(&mut inner, &self.snapshots, event).map(|_| ())
    }

    /// Write a form field. Writing the target field re-hydrates the widget
    /// from the new value; any other field is stored as-is. Once closed, the
    /// form is frozen and every write fails with [`UploadError::Closed`].
    pub fn set_field(&self, field: &str, value: Value) -> Result<(), UploadError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(UploadError::Closed);
        }
        if inner.state.target().field() == field {
            let mut record = serde_json::Map::new();
            record.insert(field.to_string(), value);
            let event = UploadEvent::Hydrate {
                record: Value::Object(record),
            };
            apply_locked(&mut inner, &self.snapshots, event)?;
        } else {
            inner.form.set(field, value);
        }
        Ok(())
    }

    /// Stop accepting selections and drop any completion that arrives later.
    /// In-flight requests are left to finish on their own.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
    }

    pub fn attachments(&self) -> Vec<AttachmentView> {
        self.lock().state.attachments()
    }

    pub fn is_uploading(&self) -> bool {
        self.lock().state.is_uploading()
    }

    pub fn form(&self) -> FormValues {
        self.lock().form.clone()
    }

    /// Current value of the target field.
    pub fn value(&self) -> Value {
        let inner = self.lock();
        inner
            .form
            .get(inner.state.target().field())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Whether the attachments and the form field currently agree.
    pub fn is_consistent(&self) -> bool {
        let inner = self.lock();
        inner.state.is_consistent_with(&inner.form)
    }

    pub fn snapshot(&self) -> UploaderSnapshot {
        let inner = self.lock();
        snapshot_of(&inner.state, &inner.form)
    }

    pub fn subscribe(&self) -> watch::Receiver<UploaderSnapshot> {
        self.snapshots.subscribe()
    }
}

fn apply_locked(
    inner: &mut Inner,
    snapshots: &watch::Sender<UploaderSnapshot>,
    event: UploadEvent,
) -> Result<(Outcome, Vec<UploadJob>), UploadError> {
    if inner.closed {
        return match event {
            UploadEvent::Started { .. }
            | UploadEvent::Succeeded { .. }
            | UploadEvent::Failed { .. } => {
                tracing::debug!("Uploader closed, completion discarded");
                Ok((Outcome::Discarded, Vec::new()))
            }
            _ => Err(UploadError::Closed),
        };
    }

    let Inner { state, form, .. } = inner;
    let result = state.apply(form, event);
    if result.is_ok() {
        snapshots.send_replace(snapshot_of(state, form));
    }
    result
}

fn snapshot_of(state: &UploadState, form: &FormValues) -> UploaderSnapshot {
    UploaderSnapshot {
        attachments: state.attachments(),
        uploading: state.is_uploading(),
        value: form
            .get(state.target().field())
            .cloned()
            .unwrap_or(Value::Null),
    }
}

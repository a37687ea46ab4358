//! Upload reconciliation widget.
//!
//! Attaches one file (scalar target) or several (list target) to a form field,
//! uploading each through an [`Uploader`] and keeping the widget's attachments
//! and the form's URL value in agreement, including after hydration from a
//! previously saved record.

pub mod error;
pub mod form;
pub mod state;
pub mod widget;

use async_trait::async_trait;
use bazaar_api_client::{ApiClient, ClientError};

pub use error::UploadError;
pub use form::FormValues;
pub use state::{
    AttachmentPhase, AttachmentView, CommittedAttachment, LocalFile, Outcome, UploadEvent,
    UploadJob, UploadState, UploadTicket,
};
pub use widget::{BatchReport, FileUploader, UploaderSnapshot};

/// Upload operation consumed by the widget: one file in, its URL out.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: &LocalFile) -> Result<String, ClientError>;
}

#[async_trait]
impl Uploader for ApiClient {
    async fn upload(&self, file: &LocalFile) -> Result<String, ClientError> {
        self.upload_file(file.to_multipart()).await
    }
}

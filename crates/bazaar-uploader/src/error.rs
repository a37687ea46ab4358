use bazaar_api_client::ClientError;
use bazaar_core::LogLevel;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Too many files: {current} attached, {requested} selected, at most {max} allowed")]
    TooManyFiles {
        max: usize,
        current: usize,
        requested: usize,
    },

    #[error("No files selected")]
    EmptySelection,

    #[error("Attachment not found: {0}")]
    NotFound(String),

    #[error("Uploader is closed")]
    Closed,

    #[error("Upload of {file_name} failed: {source}")]
    Upload {
        file_name: String,
        #[source]
        source: ClientError,
    },
}

impl UploadError {
    /// Message shown to the user next to the file input.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::TooManyFiles { max, .. } if *max == 1 => {
                "Only one file can be attached here".to_string()
            }
            UploadError::TooManyFiles { max, current, .. } => format!(
                "You can upload at most {} files ({} already attached)",
                max, current
            ),
            UploadError::EmptySelection => "Select at least one file".to_string(),
            UploadError::NotFound(_) => "That file is no longer attached".to_string(),
            UploadError::Closed => "The form has been closed".to_string(),
            UploadError::Upload { file_name, source } => {
                format!("{}: {}", file_name, source.client_message())
            }
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            UploadError::Upload { source, .. } => source.log_level(),
            UploadError::TooManyFiles { .. } => LogLevel::Warn,
            _ => LogLevel::Debug,
        }
    }
}

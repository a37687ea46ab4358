//! Error types module
//!
//! Shared error helpers. Crate-specific error enums (`ClientError`, `UploadError`)
//! live next to the code that produces them and report a [`LogLevel`] so callers
//! can decide how loudly to surface a failure.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like an expired session
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Configuration error raised while parsing environment values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

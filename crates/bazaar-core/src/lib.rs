//! Bazaar Core Library
//!
//! This crate provides the domain models, configuration and error helpers
//! shared by the Bazaar admin client crates (API client, uploader, CLI).

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ClientConfig, ReplayPolicy};
pub use error::{ConfigError, LogLevel};
pub use models::{
    AcceptFilter, ApiEnvelope, ListQuery, LoginRequest, Page, RefreshRequest, Resource,
    SessionCredential, TokenPair, UploadTarget,
};

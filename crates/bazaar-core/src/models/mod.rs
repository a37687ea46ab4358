//! Data models for the admin client
//!
//! Grouped by concern: session credentials, the backend response envelope,
//! the dashboard's REST resources, and upload target descriptors.

mod envelope;
mod resource;
mod session;
mod upload;

// Re-export all models for convenient imports
pub use envelope::*;
pub use resource::*;
pub use session::*;
pub use upload::*;

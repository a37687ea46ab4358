//! Client error taxonomy.
//!
//! Only authorization expiry gets special handling inside the client (see
//! [`crate::ApiClient::send`]); every other failure is handed back unchanged.

use bazaar_core::LogLevel;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Request was not successful: {message}")]
    Envelope { message: String },

    #[error("Failed to parse response as JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(err: validator::ValidationErrors) -> Self {
        ClientError::InvalidInput(format!("Validation error: {}", err))
    }
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ClientError::Unauthorized { .. } => true,
            ClientError::Status { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            ClientError::InvalidInput(_) => LogLevel::Debug,
            ClientError::Unauthorized { .. } | ClientError::Envelope { .. } => LogLevel::Warn,
            ClientError::Status { status, .. } if status.is_client_error() => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    /// Short message suitable for a toast notification.
    pub fn client_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Network error, check your connection and try again".to_string()
            }
            ClientError::Status { status, message } if status.is_client_error() => {
                if message.is_empty() {
                    format!("Request rejected ({})", status.as_u16())
                } else {
                    message.clone()
                }
            }
            ClientError::Status { .. } => "Server error, please try again later".to_string(),
            ClientError::Unauthorized { .. } => {
                "Your session has expired, please log in again".to_string()
            }
            ClientError::Envelope { message } => message.clone(),
            ClientError::Decode(_) => "Unexpected response from server".to_string(),
            ClientError::InvalidInput(message) => message.clone(),
            ClientError::Config(_) => "Client is misconfigured".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_metadata() {
        let err = ClientError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "maintenance".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(!err.is_unauthorized());
        assert_eq!(err.log_level(), LogLevel::Error);
        assert_eq!(err.client_message(), "Server error, please try again later");

        let err = ClientError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Product not found".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert_eq!(err.client_message(), "Product not found");
    }

    #[test]
    fn test_unauthorized_metadata() {
        let err = ClientError::Unauthorized {
            message: "token expired".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("log in again"));

        let err = ClientError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: String::new(),
        };
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_invalid_input_is_debug() {
        let err = ClientError::InvalidInput("Page must be at least 1".to_string());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.client_message(), "Page must be at least 1");
    }
}

use serde::{Deserialize, Serialize};

/// Response body shape used by every backend endpoint:
/// `{ "success": bool, "data": T, "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Payload of a successful envelope, or the server's message otherwise.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(self
                .message
                .unwrap_or_else(|| "Response contained no data".to_string())),
            (false, _) => Err(self
                .message
                .unwrap_or_else(|| "Request was not successful".to_string())),
        }
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Problem document returned by every failing API call.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Canonical reason phrase of the status code.
    pub title: String,
    pub status: u16,
    /// Stable machine-readable error code, e.g. `forbidden`.
    pub code: String,
    /// Human-readable message suitable for inline display.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

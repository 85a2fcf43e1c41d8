use serde::{Deserialize, Serialize};

use super::ChannelMessage;

/// Payload of one `data:` line on the chat stream.
///
/// ```json
/// { "type": "connected" }
/// { "type": "messages", "data": [...], "cached": true }
/// { "type": "error", "message": "..." }
/// ```
///
/// `cached` only appears when the batch was served from the staleness cache;
/// such batches may repeat across ticks and must be de-duplicated by message id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEnvelope {
    Connected,
    Messages {
        data: Vec<ChannelMessage>,
        #[serde(default, skip_serializing_if = "is_false")]
        cached: bool,
    },
    Error {
        message: String,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl StreamEnvelope {
    /// A batch read from storage.
    #[must_use]
    pub fn fresh(data: Vec<ChannelMessage>) -> Self {
        Self::Messages {
            data,
            cached: false,
        }
    }

    /// A batch re-served from the staleness cache.
    #[must_use]
    pub fn cached(data: Vec<ChannelMessage>) -> Self {
        Self::Messages { data, cached: true }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the envelope as the body of an SSE `data:` line.
    ///
    /// # Errors
    /// Returns an error if a message fails to serialize.
    pub fn to_event_data(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses the body of an SSE `data:` line, rejecting unknown `type` tags.
    ///
    /// # Errors
    /// Returns an error for malformed JSON or an unknown envelope type.
    pub fn from_event_data(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

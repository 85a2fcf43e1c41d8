use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Timestamp;

/// A chat line as delivered to clients, on the stream and from the write procedures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    /// Unique identifier for the message.
    pub id: String,

    /// Free-text content.
    pub content: String,

    /// Creation time; the authoritative ordering key.
    pub created_at: Timestamp,

    /// ID of the user who sent the message.
    pub sender_id: String,

    /// Display name of the sender, resolved at read time.
    pub sender_name: String,
}

/// Input for posting into a response thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponseMessageRequest {
    pub content: String,
    pub response_id: String,
}

/// Input for posting into a transport's public thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransportMessageRequest {
    pub content: String,
    pub transport_id: String,
}

/// Input for posting into a private chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivateChatMessageRequest {
    pub chat_id: String,
    pub content: String,
}

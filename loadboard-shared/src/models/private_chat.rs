use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConversationRef, Timestamp};

/// Conversation container between a transport's owner and one other user.
///
/// Unique on `(transport_id, owner_id, client_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateChat {
    pub id: String,
    pub transport_id: String,
    pub owner_id: String,
    pub client_id: String,
    pub created_at: Timestamp,
}

impl PrivateChat {
    /// Whether `user_id` is the owner or the client.
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.client_id == user_id
    }

    /// The stream channel for this chat.
    #[must_use]
    pub fn conversation(&self) -> ConversationRef {
        ConversationRef::PrivateChat(self.id.clone())
    }
}

/// Input for opening (or reopening) a private chat with a transport owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreatePrivateChatRequest {
    pub transport_id: String,
    pub owner_id: String,
}

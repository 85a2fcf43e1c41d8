//! Storage collaborator for chat data.
//!
//! [`ChatStore`] is the narrow query/mutation surface the chat core needs:
//! a filtered, ordered message read, a message insert, and the lookups the
//! write path uses for participant checks. Two implementations ship:
//! [`postgres::PgChatStore`] for deployments and [`memory::MemoryChatStore`]
//! for tests and database-less development.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::models::{ChannelMessage, ConversationRef, PrivateChat, Timestamp};
use thiserror::Error;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

/// `chat_type` value that marks a transport's public thread.
pub const TRANSPORT_CHAT_TYPE: &str = "transport";

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Column predicate selecting the messages of one conversation.
///
/// Every populated field must match; the unpopulated ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub response_id: Option<String>,
    pub chat_type: Option<&'static str>,
    pub chat_id: Option<String>,
    pub private_chat_id: Option<String>,
}

impl From<&ConversationRef> for MessageFilter {
    fn from(conversation: &ConversationRef) -> Self {
        match conversation {
            ConversationRef::ResponseThread(id) => Self {
                response_id: Some(id.clone()),
                ..Self::default()
            },
            ConversationRef::TransportThread(id) => Self {
                chat_type: Some(TRANSPORT_CHAT_TYPE),
                chat_id: Some(id.clone()),
                ..Self::default()
            },
            ConversationRef::PrivateChat(id) => Self {
                private_chat_id: Some(id.clone()),
                ..Self::default()
            },
        }
    }
}

impl MessageFilter {
    /// Checks a row's association columns against this filter.
    #[must_use]
    pub fn matches(
        &self,
        response_id: Option<&str>,
        chat_type: Option<&str>,
        chat_id: Option<&str>,
        private_chat_id: Option<&str>,
    ) -> bool {
        fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
            expected.is_none_or(|expected| actual == Some(expected))
        }

        field_matches(self.response_id.as_deref(), response_id)
            && field_matches(self.chat_type, chat_type)
            && field_matches(self.chat_id.as_deref(), chat_id)
            && field_matches(self.private_chat_id.as_deref(), private_chat_id)
    }
}

/// A message to insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub sender_id: String,
    pub conversation: ConversationRef,
    pub created_at: Timestamp,
}

/// The two parties of a response thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParticipants {
    pub response_id: String,
    /// Carrier who submitted the response.
    pub carrier_id: String,
    /// Customer who owns the order the response answers.
    pub customer_id: String,
}

impl ResponseParticipants {
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.carrier_id == user_id || self.customer_id == user_id
    }
}

/// A transport listing and the user who posted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportListing {
    pub id: String,
    pub owner_id: String,
}

/// Persistence of messages and the conversations they belong to.
#[async_trait]
pub trait ChatStore: Send + Sync + std::fmt::Debug {
    /// Messages matching `filter`, newer than `after` when given, oldest first.
    async fn find_messages(
        &self,
        filter: &MessageFilter,
        after: Option<Timestamp>,
    ) -> StoreResult<Vec<ChannelMessage>>;

    /// Inserts a message and returns it with the sender's display name.
    async fn insert_message(&self, message: NewMessage) -> StoreResult<ChannelMessage>;

    async fn find_response(&self, response_id: &str) -> StoreResult<Option<ResponseParticipants>>;

    async fn find_transport(&self, transport_id: &str) -> StoreResult<Option<TransportListing>>;

    async fn find_private_chat(&self, chat_id: &str) -> StoreResult<Option<PrivateChat>>;

    /// Returns the chat keyed by `(transport_id, owner_id, client_id)`, creating it with
    /// `created_at` if absent.
    async fn find_or_create_private_chat(
        &self,
        transport_id: &str,
        owner_id: &str,
        client_id: &str,
        created_at: Timestamp,
    ) -> StoreResult<PrivateChat>;

    /// Private chats the user owns or joined as client, newest first.
    async fn list_private_chats_for(&self, user_id: &str) -> StoreResult<Vec<PrivateChat>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_per_conversation_kind() {
        let filter = MessageFilter::from(&ConversationRef::resolve("r1"));
        assert_eq!(filter.response_id.as_deref(), Some("r1"));
        assert!(filter.chat_type.is_none() && filter.private_chat_id.is_none());

        let filter = MessageFilter::from(&ConversationRef::resolve("transport-abc"));
        assert_eq!(filter.chat_type, Some(TRANSPORT_CHAT_TYPE));
        assert_eq!(filter.chat_id.as_deref(), Some("abc"));
        assert!(filter.response_id.is_none());

        let filter = MessageFilter::from(&ConversationRef::resolve("private-chat-xyz"));
        assert_eq!(filter.private_chat_id.as_deref(), Some("xyz"));
        assert!(filter.chat_id.is_none());
    }

    #[test]
    fn filter_matches_only_its_conversation() {
        let filter = MessageFilter::from(&ConversationRef::TransportThread("abc".into()));

        assert!(filter.matches(None, Some("transport"), Some("abc"), None));
        assert!(!filter.matches(None, Some("transport"), Some("other"), None));
        assert!(!filter.matches(Some("abc"), None, None, None));
        assert!(!filter.matches(None, None, None, Some("abc")));
    }

    #[test]
    fn response_participants_are_carrier_and_customer() {
        let participants = ResponseParticipants {
            response_id: "r1".into(),
            carrier_id: "carrier".into(),
            customer_id: "customer".into(),
        };

        assert!(participants.is_participant("carrier"));
        assert!(participants.is_participant("customer"));
        assert!(!participants.is_participant("stranger"));
    }
}

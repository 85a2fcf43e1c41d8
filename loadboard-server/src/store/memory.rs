use std::collections::HashMap;

use async_trait::async_trait;
use shared::models::{ChannelMessage, ConversationRef, PrivateChat, Timestamp};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ChatStore, MessageFilter, NewMessage, ResponseParticipants, StoreError, StoreResult,
    TRANSPORT_CHAT_TYPE, TransportListing,
};

/// Display name used when a sender has no user record.
pub const UNKNOWN_SENDER: &str = "Unknown";

#[derive(Debug, Clone)]
struct MessageRow {
    id: String,
    content: String,
    created_at: Timestamp,
    sender_id: String,
    response_id: Option<String>,
    chat_type: Option<&'static str>,
    chat_id: Option<String>,
    private_chat_id: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, String>,
    responses: HashMap<String, ResponseParticipants>,
    transports: HashMap<String, TransportListing>,
    private_chats: Vec<PrivateChat>,
    messages: Vec<MessageRow>,
}

impl Tables {
    fn sender_name(&self, sender_id: &str) -> String {
        self.users
            .get(sender_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string())
    }

    fn to_message(&self, row: &MessageRow) -> ChannelMessage {
        ChannelMessage {
            id: row.id.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            sender_id: row.sender_id.clone(),
            sender_name: self.sender_name(&row.sender_id),
        }
    }
}

/// In-process [`ChatStore`] backed by plain collections.
///
/// Used by the test suites and by `serve` when no database URL is configured.
/// Seed methods stand in for the order/response/transport tables that other
/// parts of the marketplace own.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    tables: RwLock<Tables>,
    fail_reads: RwLock<Option<String>>,
}

impl MemoryChatStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a display name for `id`.
    pub async fn add_user(&self, id: impl Into<String>, name: impl Into<String>) {
        self.tables.write().await.users.insert(id.into(), name.into());
    }

    /// Adds a response with its carrier and customer.
    pub async fn add_response(
        &self,
        response_id: impl Into<String>,
        carrier_id: impl Into<String>,
        customer_id: impl Into<String>,
    ) {
        let participants = ResponseParticipants {
            response_id: response_id.into(),
            carrier_id: carrier_id.into(),
            customer_id: customer_id.into(),
        };
        self.tables
            .write()
            .await
            .responses
            .insert(participants.response_id.clone(), participants);
    }

    /// Adds a transport listing owned by `owner_id`.
    pub async fn add_transport(&self, id: impl Into<String>, owner_id: impl Into<String>) {
        let listing = TransportListing {
            id: id.into(),
            owner_id: owner_id.into(),
        };
        self.tables
            .write()
            .await
            .transports
            .insert(listing.id.clone(), listing);
    }

    /// Makes every subsequent `find_messages` call fail until cleared with `None`.
    pub async fn fail_reads(&self, reason: Option<&str>) {
        *self.fail_reads.write().await = reason.map(str::to_string);
    }

    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_messages(
        &self,
        filter: &MessageFilter,
        after: Option<Timestamp>,
    ) -> StoreResult<Vec<ChannelMessage>> {
        if let Some(reason) = self.fail_reads.read().await.clone() {
            return Err(StoreError::Unavailable(reason));
        }

        let tables = self.tables.read().await;
        let mut rows: Vec<&MessageRow> = tables
            .messages
            .iter()
            .filter(|row| {
                filter.matches(
                    row.response_id.as_deref(),
                    row.chat_type,
                    row.chat_id.as_deref(),
                    row.private_chat_id.as_deref(),
                )
            })
            .filter(|row| after.is_none_or(|cursor| row.created_at > cursor))
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(rows.into_iter().map(|row| tables.to_message(row)).collect())
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<ChannelMessage> {
        let mut row = MessageRow {
            id: Uuid::new_v4().to_string(),
            content: message.content,
            created_at: message.created_at,
            sender_id: message.sender_id,
            response_id: None,
            chat_type: None,
            chat_id: None,
            private_chat_id: None,
        };
        match message.conversation {
            ConversationRef::ResponseThread(id) => row.response_id = Some(id),
            ConversationRef::TransportThread(id) => {
                row.chat_type = Some(TRANSPORT_CHAT_TYPE);
                row.chat_id = Some(id);
            }
            ConversationRef::PrivateChat(id) => row.private_chat_id = Some(id),
        }

        let mut tables = self.tables.write().await;
        let created = tables.to_message(&row);
        tables.messages.push(row);
        Ok(created)
    }

    async fn find_response(&self, response_id: &str) -> StoreResult<Option<ResponseParticipants>> {
        Ok(self.tables.read().await.responses.get(response_id).cloned())
    }

    async fn find_transport(&self, transport_id: &str) -> StoreResult<Option<TransportListing>> {
        Ok(self.tables.read().await.transports.get(transport_id).cloned())
    }

    async fn find_private_chat(&self, chat_id: &str) -> StoreResult<Option<PrivateChat>> {
        Ok(self
            .tables
            .read()
            .await
            .private_chats
            .iter()
            .find(|chat| chat.id == chat_id)
            .cloned())
    }

    async fn find_or_create_private_chat(
        &self,
        transport_id: &str,
        owner_id: &str,
        client_id: &str,
        created_at: Timestamp,
    ) -> StoreResult<PrivateChat> {
        // Held across lookup and insert so the key stays unique.
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.private_chats.iter().find(|chat| {
            chat.transport_id == transport_id
                && chat.owner_id == owner_id
                && chat.client_id == client_id
        }) {
            return Ok(existing.clone());
        }

        let chat = PrivateChat {
            id: Uuid::new_v4().to_string(),
            transport_id: transport_id.to_string(),
            owner_id: owner_id.to_string(),
            client_id: client_id.to_string(),
            created_at,
        };
        tables.private_chats.push(chat.clone());
        Ok(chat)
    }

    async fn list_private_chats_for(&self, user_id: &str) -> StoreResult<Vec<PrivateChat>> {
        let tables = self.tables.read().await;
        let mut chats: Vec<PrivateChat> = tables
            .private_chats
            .iter()
            .filter(|chat| chat.is_participant(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }
}

//! Postgres-backed chat store.
//!
//! Tables are created by the `db/schema` bootstrap scripts. Message rows
//! carry exactly one association (`response_id`, `chat_type`/`chat_id`, or
//! `private_chat_id`), enforced by a check constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{ChannelMessage, ConversationRef, PrivateChat, Timestamp};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{
    ChatStore, MessageFilter, NewMessage, ResponseParticipants, StoreResult, TRANSPORT_CHAT_TYPE,
    TransportListing,
};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    content: String,
    created_at: DateTime<Utc>,
    sender_id: String,
    sender_name: String,
}

impl From<MessageRow> for ChannelMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            created_at: Timestamp(row.created_at),
            sender_id: row.sender_id,
            sender_name: row.sender_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PrivateChatRow {
    id: String,
    transport_id: String,
    owner_id: String,
    client_id: String,
    created_at: DateTime<Utc>,
}

impl From<PrivateChatRow> for PrivateChat {
    fn from(row: PrivateChatRow) -> Self {
        Self {
            id: row.id,
            transport_id: row.transport_id,
            owner_id: row.owner_id,
            client_id: row.client_id,
            created_at: Timestamp(row.created_at),
        }
    }
}

const FIND_MESSAGES_SQL: &str = r"
SELECT m.id, m.content, m.created_at, m.sender_id,
       COALESCE(u.name, 'Unknown') AS sender_name
FROM messages m
LEFT JOIN users u ON u.id = m.sender_id
WHERE ($1::text IS NULL OR m.response_id = $1)
  AND ($2::text IS NULL OR m.chat_type = $2)
  AND ($3::text IS NULL OR m.chat_id = $3)
  AND ($4::text IS NULL OR m.private_chat_id = $4)
  AND ($5::timestamptz IS NULL OR m.created_at > $5)
ORDER BY m.created_at ASC, m.id ASC
";

const INSERT_MESSAGE_SQL: &str = r"
WITH inserted AS (
    INSERT INTO messages (id, content, created_at, sender_id, response_id, chat_type, chat_id, private_chat_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING id, content, created_at, sender_id
)
SELECT i.id, i.content, i.created_at, i.sender_id,
       COALESCE(u.name, 'Unknown') AS sender_name
FROM inserted i
LEFT JOIN users u ON u.id = i.sender_id
";

const UPSERT_PRIVATE_CHAT_SQL: &str = r"
INSERT INTO private_chats (id, transport_id, owner_id, client_id, created_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (transport_id, owner_id, client_id)
DO UPDATE SET transport_id = EXCLUDED.transport_id
RETURNING id, transport_id, owner_id, client_id, created_at
";

/// [`ChatStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    #[instrument(name = "store.find_messages", skip(self), err)]
    async fn find_messages(
        &self,
        filter: &MessageFilter,
        after: Option<Timestamp>,
    ) -> StoreResult<Vec<ChannelMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(FIND_MESSAGES_SQL)
            .bind(filter.response_id.as_deref())
            .bind(filter.chat_type)
            .bind(filter.chat_id.as_deref())
            .bind(filter.private_chat_id.as_deref())
            .bind(after.map(|cursor| cursor.0))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ChannelMessage::from).collect())
    }

    #[instrument(name = "store.insert_message", skip(self, message), fields(conversation = %message.conversation), err)]
    async fn insert_message(&self, message: NewMessage) -> StoreResult<ChannelMessage> {
        let (response_id, chat_type, chat_id, private_chat_id) = match &message.conversation {
            ConversationRef::ResponseThread(id) => (Some(id.as_str()), None, None, None),
            ConversationRef::TransportThread(id) => {
                (None, Some(TRANSPORT_CHAT_TYPE), Some(id.as_str()), None)
            }
            ConversationRef::PrivateChat(id) => (None, None, None, Some(id.as_str())),
        };

        let row = sqlx::query_as::<_, MessageRow>(INSERT_MESSAGE_SQL)
            .bind(Uuid::new_v4().to_string())
            .bind(&message.content)
            .bind(message.created_at.0)
            .bind(&message.sender_id)
            .bind(response_id)
            .bind(chat_type)
            .bind(chat_id)
            .bind(private_chat_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn find_response(&self, response_id: &str) -> StoreResult<Option<ResponseParticipants>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT r.id, r.carrier_id, o.customer_id FROM responses r JOIN orders o ON o.id = r.order_id WHERE r.id = $1",
        )
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(response_id, carrier_id, customer_id)| ResponseParticipants {
            response_id,
            carrier_id,
            customer_id,
        }))
    }

    async fn find_transport(&self, transport_id: &str) -> StoreResult<Option<TransportListing>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, owner_id FROM transports WHERE id = $1",
        )
        .bind(transport_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, owner_id)| TransportListing { id, owner_id }))
    }

    async fn find_private_chat(&self, chat_id: &str) -> StoreResult<Option<PrivateChat>> {
        let row = sqlx::query_as::<_, PrivateChatRow>(
            "SELECT id, transport_id, owner_id, client_id, created_at FROM private_chats WHERE id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PrivateChat::from))
    }

    #[instrument(name = "store.find_or_create_private_chat", skip(self), err)]
    async fn find_or_create_private_chat(
        &self,
        transport_id: &str,
        owner_id: &str,
        client_id: &str,
        created_at: Timestamp,
    ) -> StoreResult<PrivateChat> {
        let row = sqlx::query_as::<_, PrivateChatRow>(UPSERT_PRIVATE_CHAT_SQL)
            .bind(Uuid::new_v4().to_string())
            .bind(transport_id)
            .bind(owner_id)
            .bind(client_id)
            .bind(created_at.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn list_private_chats_for(&self, user_id: &str) -> StoreResult<Vec<PrivateChat>> {
        let rows = sqlx::query_as::<_, PrivateChatRow>(
            "SELECT id, transport_id, owner_id, client_id, created_at FROM private_chats \
             WHERE owner_id = $1 OR client_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PrivateChat::from).collect())
    }
}

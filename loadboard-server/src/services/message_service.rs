//! Chat write path and history reads.
//!
//! Each conversation kind has its own precondition before a message is
//! stored:
//!
//! * response thread: the response exists and the sender is its carrier or
//!   the customer who owns the order;
//! * transport thread: the transport exists; any authenticated user may post;
//! * private chat: the chat exists and the sender is its owner or client.
//!
//! Writes never touch the staleness cache or delivery cursors. Pollers pick
//! new rows up on their next uncached tick.

use std::sync::Arc;

use shared::models::{
    ChannelMessage, ConversationRef, CreatePrivateChatMessageRequest,
    CreateResponseMessageRequest, CreateTransportMessageRequest, GetOrCreatePrivateChatRequest,
    PrivateChat, Timestamp,
};
use thiserror::Error;
use tracing::instrument;

use super::clock::Clock;
use crate::store::{ChatStore, MessageFilter, NewMessage, StoreError};

/// Upper bound on message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Failure of a write or history call.
#[derive(Debug, Error)]
pub enum MessageServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type MessageServiceResult<T> = Result<T, MessageServiceError>;

/// Chat write path over a [`ChatStore`], stamping with the injected [`Clock`].
#[derive(Debug, Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
    clock: Arc<dyn Clock>,
}

impl MessageService {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Posts into a response thread. The sender must be its carrier or customer.
    #[instrument(name = "chat.create_response_message", skip(self, request), fields(response_id = %request.response_id), err)]
    pub async fn create_response_message(
        &self,
        sender_id: &str,
        request: CreateResponseMessageRequest,
    ) -> MessageServiceResult<ChannelMessage> {
        self.create_message(
            sender_id,
            ConversationRef::ResponseThread(request.response_id),
            &request.content,
        )
        .await
    }

    /// Posts into a transport's public thread.
    #[instrument(name = "chat.create_transport_message", skip(self, request), fields(transport_id = %request.transport_id), err)]
    pub async fn create_transport_message(
        &self,
        sender_id: &str,
        request: CreateTransportMessageRequest,
    ) -> MessageServiceResult<ChannelMessage> {
        self.create_message(
            sender_id,
            ConversationRef::TransportThread(request.transport_id),
            &request.content,
        )
        .await
    }

    /// Posts into a private chat. The sender must be its owner or client.
    #[instrument(name = "chat.create_private_chat_message", skip(self, request), fields(chat_id = %request.chat_id), err)]
    pub async fn create_private_chat_message(
        &self,
        sender_id: &str,
        request: CreatePrivateChatMessageRequest,
    ) -> MessageServiceResult<ChannelMessage> {
        self.create_message(
            sender_id,
            ConversationRef::PrivateChat(request.chat_id),
            &request.content,
        )
        .await
    }

    /// Returns the caller's private chat with the transport's owner, opening it if needed.
    ///
    /// The caller becomes the chat's client.
    #[instrument(name = "chat.get_or_create_private_chat", skip(self, request), fields(transport_id = %request.transport_id), err)]
    pub async fn get_or_create_private_chat(
        &self,
        caller_id: &str,
        request: GetOrCreatePrivateChatRequest,
    ) -> MessageServiceResult<PrivateChat> {
        let transport = self
            .store
            .find_transport(&request.transport_id)
            .await?
            .ok_or_else(|| {
                MessageServiceError::NotFound(format!("transport {}", request.transport_id))
            })?;

        if transport.owner_id != request.owner_id {
            return Err(MessageServiceError::Validation(
                "ownerId does not own this transport".into(),
            ));
        }
        if caller_id == request.owner_id {
            return Err(MessageServiceError::Validation(
                "cannot open a private chat with yourself".into(),
            ));
        }

        Ok(self
            .store
            .find_or_create_private_chat(
                &transport.id,
                &transport.owner_id,
                caller_id,
                Timestamp(self.clock.now()),
            )
            .await?)
    }

    /// Stores a message in `conversation` after checking the sender may post there.
    #[instrument(name = "chat.create_message", skip(self, conversation, content), fields(%conversation), err)]
    pub async fn create_message(
        &self,
        sender_id: &str,
        conversation: ConversationRef,
        content: &str,
    ) -> MessageServiceResult<ChannelMessage> {
        let content = validate_content(content)?;
        self.authorize(sender_id, &conversation).await?;

        let message = NewMessage {
            content,
            sender_id: sender_id.to_string(),
            conversation,
            created_at: Timestamp(self.clock.now()),
        };
        Ok(self.store.insert_message(message).await?)
    }

    /// Full history of `conversation`, oldest first.
    #[instrument(name = "chat.list_messages", skip(self, conversation), fields(%conversation), err)]
    pub async fn list_messages(
        &self,
        caller_id: &str,
        conversation: ConversationRef,
    ) -> MessageServiceResult<Vec<ChannelMessage>> {
        self.authorize(caller_id, &conversation).await?;
        Ok(self
            .store
            .find_messages(&MessageFilter::from(&conversation), None)
            .await?)
    }

    /// Private chats the caller takes part in, newest first.
    #[instrument(name = "chat.list_private_chats", skip(self), err)]
    pub async fn list_private_chats(&self, caller_id: &str) -> MessageServiceResult<Vec<PrivateChat>> {
        Ok(self.store.list_private_chats_for(caller_id).await?)
    }

    /// Checks that `user_id` may watch `conversation` over the event stream.
    ///
    /// A stream may be opened before its conversation exists, so a missing
    /// response or private chat is allowed. An existing one admits only its
    /// participants. Transport threads are public.
    #[instrument(name = "chat.authorize_stream", skip(self, conversation), fields(%conversation), err)]
    pub async fn authorize_stream(
        &self,
        user_id: &str,
        conversation: &ConversationRef,
    ) -> MessageServiceResult<()> {
        let admitted = match conversation {
            ConversationRef::ResponseThread(id) => self
                .store
                .find_response(id)
                .await?
                .is_none_or(|response| response.is_participant(user_id)),
            ConversationRef::TransportThread(_) => true,
            ConversationRef::PrivateChat(id) => self
                .store
                .find_private_chat(id)
                .await?
                .is_none_or(|chat| chat.is_participant(user_id)),
        };
        if admitted {
            Ok(())
        } else {
            Err(MessageServiceError::Forbidden(format!(
                "not a participant of {conversation}"
            )))
        }
    }

    async fn authorize(
        &self,
        user_id: &str,
        conversation: &ConversationRef,
    ) -> MessageServiceResult<()> {
        match conversation {
            ConversationRef::ResponseThread(id) => {
                let response = self
                    .store
                    .find_response(id)
                    .await?
                    .ok_or_else(|| MessageServiceError::NotFound(format!("response {id}")))?;
                if !response.is_participant(user_id) {
                    return Err(MessageServiceError::Forbidden(
                        "not a participant of this response thread".into(),
                    ));
                }
            }
            // Public thread: existence is the only requirement.
            ConversationRef::TransportThread(id) => {
                self.store
                    .find_transport(id)
                    .await?
                    .ok_or_else(|| MessageServiceError::NotFound(format!("transport {id}")))?;
            }
            ConversationRef::PrivateChat(id) => {
                let chat = self
                    .store
                    .find_private_chat(id)
                    .await?
                    .ok_or_else(|| MessageServiceError::NotFound(format!("private chat {id}")))?;
                if !chat.is_participant(user_id) {
                    return Err(MessageServiceError::Forbidden(
                        "not a participant of this private chat".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn validate_content(content: &str) -> MessageServiceResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(MessageServiceError::Validation(
            "content must not be empty".into(),
        ));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MessageServiceError::Validation(format!(
            "content exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

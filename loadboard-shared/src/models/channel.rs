//! Channel identifiers and the conversation they address.
//!
//! A channel identifier is the opaque string a client hands to the stream
//! endpoint. Its shape encodes the conversation kind:
//!
//! | channel id            | conversation                 |
//! |-----------------------|------------------------------|
//! | `private-chat-<id>`   | private chat `<id>`          |
//! | `transport-<id>`      | public thread of transport `<id>` |
//! | anything else         | response thread, id unchanged |
//!
//! Decoding is total: every string maps to exactly one conversation.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

const PRIVATE_CHAT_PREFIX: &str = "private-chat-";
const TRANSPORT_PREFIX: &str = "transport-";

/// The three message-container shapes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    ResponseThread,
    TransportThread,
    PrivateChat,
}

impl ConversationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResponseThread => "response_thread",
            Self::TransportThread => "transport_thread",
            Self::PrivateChat => "private_chat",
        }
    }
}

impl Display for ConversationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A decoded channel: conversation kind plus the id of the underlying row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationRef {
    /// Thread attached to a carrier's response on an order.
    ResponseThread(String),
    /// Public thread attached to a transport listing.
    TransportThread(String),
    /// Private chat between a transport owner and one client.
    PrivateChat(String),
}

impl ConversationRef {
    /// Decodes a channel identifier. Never fails; unprefixed ids are response threads.
    #[must_use]
    pub fn resolve(channel_id: &str) -> Self {
        if let Some(rest) = channel_id.strip_prefix(PRIVATE_CHAT_PREFIX) {
            Self::PrivateChat(rest.to_string())
        } else if let Some(rest) = channel_id.strip_prefix(TRANSPORT_PREFIX) {
            Self::TransportThread(rest.to_string())
        } else {
            Self::ResponseThread(channel_id.to_string())
        }
    }

    /// Kind of conversation this reference addresses.
    #[must_use]
    pub const fn kind(&self) -> ConversationKind {
        match self {
            Self::ResponseThread(_) => ConversationKind::ResponseThread,
            Self::TransportThread(_) => ConversationKind::TransportThread,
            Self::PrivateChat(_) => ConversationKind::PrivateChat,
        }
    }

    /// Id of the response, transport, or private chat row.
    #[must_use]
    pub fn underlying_id(&self) -> &str {
        match self {
            Self::ResponseThread(id) | Self::TransportThread(id) | Self::PrivateChat(id) => id,
        }
    }

    /// Encodes this conversation back into the channel identifier clients use.
    #[must_use]
    pub fn channel_id(&self) -> String {
        match self {
            Self::ResponseThread(id) => id.clone(),
            Self::TransportThread(id) => format!("{TRANSPORT_PREFIX}{id}"),
            Self::PrivateChat(id) => format!("{PRIVATE_CHAT_PREFIX}{id}"),
        }
    }
}

impl From<&str> for ConversationRef {
    fn from(value: &str) -> Self {
        Self::resolve(value)
    }
}

impl Display for ConversationRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind(), self.underlying_id())
    }
}

pub mod channel;
pub mod errors;
pub mod message;
pub mod private_chat;
pub mod stream;
pub mod timeline;
pub mod timestamp;

pub use channel::{ConversationKind, ConversationRef};
pub use errors::ErrorResponse;
pub use message::{
    ChannelMessage, CreatePrivateChatMessageRequest, CreateResponseMessageRequest,
    CreateTransportMessageRequest,
};
pub use private_chat::{GetOrCreatePrivateChatRequest, PrivateChat};
pub use stream::StreamEnvelope;
pub use timeline::MessageTimeline;
pub use timestamp::Timestamp;

#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::models::{
    ChannelMessage, CreatePrivateChatMessageRequest, CreateResponseMessageRequest,
    CreateTransportMessageRequest, ErrorResponse, GetOrCreatePrivateChatRequest, PrivateChat,
};
use utoipa::OpenApi;

/// OpenAPI document of the chat API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loadboard Chat API",
        version = "1.0.0",
        description = "Chat write procedures and the polling event stream for the loadboard marketplace"
    ),
    paths(
        crate::handlers::streaming::chat_stream,
        crate::handlers::messages::create_response_message,
        crate::handlers::messages::create_transport_message,
        crate::handlers::messages::get_or_create_private_chat,
        crate::handlers::messages::create_private_chat_message,
        crate::handlers::messages::list_messages,
        crate::handlers::messages::list_private_chats,
    ),
    components(
        schemas(
            ChannelMessage,
            PrivateChat,
            CreateResponseMessageRequest,
            CreateTransportMessageRequest,
            CreatePrivateChatMessageRequest,
            GetOrCreatePrivateChatRequest,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Chat", description = "Conversation threads, private chats, and delivery stream")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_chat_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/sse",
            "/api/chat/response-messages",
            "/api/chat/transport-messages",
            "/api/chat/private-chats",
            "/api/chat/private-chats/messages",
            "/api/chat/messages",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

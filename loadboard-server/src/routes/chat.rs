use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    app_state::AppState,
    handlers::{messages, streaming},
    middleware::auth::require_session,
};

/// Chat write procedures and the delivery stream. Every route requires a session.
pub fn create_chat_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sse", get(streaming::chat_stream))
        .route(
            "/api/chat/response-messages",
            post(messages::create_response_message),
        )
        .route(
            "/api/chat/transport-messages",
            post(messages::create_transport_message),
        )
        .route(
            "/api/chat/private-chats",
            get(messages::list_private_chats).post(messages::get_or_create_private_chat),
        )
        .route(
            "/api/chat/private-chats/messages",
            post(messages::create_private_chat_message),
        )
        .route("/api/chat/messages", get(messages::list_messages))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

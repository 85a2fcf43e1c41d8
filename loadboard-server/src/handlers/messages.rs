use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use shared::models::{
    ChannelMessage, ConversationRef, CreatePrivateChatMessageRequest,
    CreateResponseMessageRequest, CreateTransportMessageRequest, ErrorResponse,
    GetOrCreatePrivateChatRequest, PrivateChat,
};
use tracing::instrument;

use crate::{
    app_state::AppState,
    auth::session::SessionUser,
    http::error::{ApiError, AppResult},
};

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

/// Posts a message into a response thread.
#[utoipa::path(
    post,
    path = "/api/chat/response-messages",
    request_body = CreateResponseMessageRequest,
    responses(
        (status = 201, description = "Message stored in the response thread", body = ChannelMessage),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 403, description = "Caller is neither the carrier nor the order's customer", body = ErrorResponse),
        (status = 404, description = "Response not found", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_response_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<CreateResponseMessageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ChannelMessage>)> {
    let request = parse_body(payload)?;
    let message = state
        .messages
        .create_response_message(&user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Posts a message into a transport's public thread.
#[utoipa::path(
    post,
    path = "/api/chat/transport-messages",
    request_body = CreateTransportMessageRequest,
    responses(
        (status = 201, description = "Message stored in the transport's public thread", body = ChannelMessage),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 404, description = "Transport not found", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_transport_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<CreateTransportMessageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ChannelMessage>)> {
    let request = parse_body(payload)?;
    let message = state
        .messages
        .create_transport_message(&user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Returns the caller's private chat with a transport owner.
#[utoipa::path(
    post,
    path = "/api/chat/private-chats",
    request_body = GetOrCreatePrivateChatRequest,
    responses(
        (status = 200, description = "Existing or newly opened private chat", body = PrivateChat),
        (status = 400, description = "Owner mismatch or chat with self", body = ErrorResponse),
        (status = 404, description = "Transport not found", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_or_create_private_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<GetOrCreatePrivateChatRequest>, JsonRejection>,
) -> AppResult<Json<PrivateChat>> {
    let request = parse_body(payload)?;
    let chat = state
        .messages
        .get_or_create_private_chat(&user.id, request)
        .await?;
    Ok(Json(chat))
}

/// Posts a message into a private chat.
#[utoipa::path(
    post,
    path = "/api/chat/private-chats/messages",
    request_body = CreatePrivateChatMessageRequest,
    responses(
        (status = 201, description = "Message stored in the private chat", body = ChannelMessage),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 403, description = "Caller is not the chat's owner or client", body = ErrorResponse),
        (status = 404, description = "Private chat not found", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_private_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<CreatePrivateChatMessageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ChannelMessage>)> {
    let request = parse_body(payload)?;
    let message = state
        .messages
        .create_private_chat_message(&user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Query string of `GET /api/chat/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub channel_id: Option<String>,
}

/// Full history of one channel.
#[utoipa::path(
    get,
    path = "/api/chat/messages",
    params(
        ("channelId" = String, Query, description = "Channel identifier, decoded like the stream's")
    ),
    responses(
        (status = 200, description = "Conversation history, oldest first", body = [ChannelMessage]),
        (status = 400, description = "Missing channel identifier", body = ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ChannelMessage>>> {
    let channel = query
        .channel_id
        .ok_or_else(|| ApiError::validation("channelId is required"))?;
    let messages = state
        .messages
        .list_messages(&user.id, ConversationRef::resolve(&channel))
        .await?;
    Ok(Json(messages))
}

/// Private chats of the session user.
#[utoipa::path(
    get,
    path = "/api/chat/private-chats",
    responses(
        (status = 200, description = "Private chats the caller owns or joined, newest first", body = [PrivateChat]),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_private_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> AppResult<Json<Vec<PrivateChat>>> {
    Ok(Json(state.messages.list_private_chats(&user.id).await?))
}

//! Event-stream endpoint for chat delivery.
//!
//! One request opens one poll session. Each emitted envelope becomes a
//! single unnamed `data:` event; keep-alive comments fill the gaps between
//! ticks and carry no data.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Extension, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use shared::models::{ConversationRef, ErrorResponse, StreamEnvelope};
use tracing::{info, instrument, warn};

use crate::{
    app_state::AppState,
    auth::session::SessionUser,
    http::error::{ApiError, AppResult},
};

/// Pre-encoded error envelope used when an envelope cannot be serialized.
const ENCODING_FAILED_EVENT: &str = r#"{"type":"error","message":"Failed to fetch messages"}"#;

/// Query string of `GET /api/sse`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    /// Channel identifier; any conversation kind despite the name.
    pub response_id: Option<String>,
}

/// Opens a chat stream for one channel.
#[utoipa::path(
    get,
    path = "/api/sse",
    params(
        ("responseId" = String, Query, description = "Channel identifier: a response id, `transport-<id>`, or `private-chat-<id>`")
    ),
    responses(
        (status = 200, description = "Event stream of `connected`, `messages`, and `error` envelopes", content_type = "text/event-stream", body = String),
        (status = 400, description = "Missing channel identifier", body = ErrorResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not a participant of the conversation", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let channel = query
        .response_id
        .ok_or_else(|| ApiError::validation("responseId is required"))?;

    state
        .messages
        .authorize_stream(&user.id, &ConversationRef::resolve(&channel))
        .await?;

    info!(%channel, "opening chat stream");
    let session = state.poller.open(channel);
    let stream = session.map(|envelope| Ok::<_, Infallible>(envelope_event(&envelope)));

    let keepalive = KeepAlive::new()
        .interval(state.config.chat.heartbeat())
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}

/// Encodes an envelope as an unnamed SSE event.
pub fn envelope_event(envelope: &StreamEnvelope) -> Event {
    match envelope.to_event_data() {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            warn!(error = %err, "failed to encode stream envelope");
            Event::default().data(ENCODING_FAILED_EVENT)
        }
    }
}

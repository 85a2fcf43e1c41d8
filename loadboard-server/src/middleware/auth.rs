use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{self, header},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use tracing::{debug, instrument};

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
};

/// Rejects requests without a valid session cookie and attaches the session user.
///
/// # Errors
/// `401 unauthorized` when the cookie is missing or unknown; `500` when the
/// session directory fails.
#[instrument(name = "auth.require_session", skip_all, fields(path = %req.uri().path()))]
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let cookie_name = &state.config.session.session_cookie_name;
    let token = extract_session_cookie(req.headers(), cookie_name)
        .ok_or_else(|| ApiError::unauthorized("session required"))?;

    let user = state
        .sessions
        .resolve(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("session expired or unknown"))?;
    debug!(user_id = %user.id, "session resolved");

    if let Some(context) = req.extensions_mut().get_mut::<RequestContext>() {
        context.session = Some(user.clone());
    } else {
        req.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            session: Some(user.clone()),
        });
    }
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

fn extract_session_cookie(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .flatten()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

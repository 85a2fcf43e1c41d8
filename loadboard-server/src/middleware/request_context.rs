use std::str::FromStr;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    auth::session::SessionUser,
    http::error::{ApiError, AppResult},
};
use shared::config::server::Config;

/// Per-request data shared by middleware, tracing, and handlers.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub session: Option<SessionUser>,
}

impl RequestContext {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.id.as_str())
    }
}

/// Name of the header carrying the request id.
#[derive(Clone, Debug)]
pub struct RequestIdState {
    header: HeaderName,
}

impl RequestIdState {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let header = HeaderName::from_str(&config.server.request_id_header)
            .unwrap_or_else(|_| HeaderName::from_static("x-request-id"));
        Self { header }
    }
}

/// Reuses the caller's request id or assigns a fresh one, echoing it on the response.
///
/// # Errors
/// Fails only if the id cannot be encoded as a header value.
pub async fn assign_request_id(
    State(state): State<RequestIdState>,
    mut request: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let request_id = extract_request_id(request.headers(), &state.header)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let header_value = HeaderValue::from_str(&request_id)
        .map_err(|_| ApiError::internal_server_error("failed to encode request id"))?;

    request.extensions_mut().insert(RequestContext {
        request_id,
        session: None,
    });
    request
        .headers_mut()
        .insert(state.header.clone(), header_value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(state.header, header_value);

    Ok(response)
}

fn extract_request_id(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use shared::config::server::Profile;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = RequestIdState::from_config(&Config::default_for_profile(Profile::Test));
        Router::new()
            .route(
                "/",
                get(|axum::Extension(context): axum::Extension<RequestContext>| async move {
                    context.request_id
                }),
            )
            .layer(from_fn_with_state(state, assign_request_id))
    }

    #[tokio::test]
    async fn keeps_incoming_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "abc-123");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"abc-123");
    }

    #[tokio::test]
    async fn assigns_uuid_when_missing_or_blank() {
        for header in [None, Some("   ")] {
            let mut builder = Request::builder().uri("/");
            if let Some(value) = header {
                builder = builder.header("x-request-id", value);
            }
            let response = app()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            let id = response.headers()["x-request-id"].to_str().unwrap();
            assert!(Uuid::parse_str(id).is_ok(), "{id} is not a uuid");
        }
    }

    #[test]
    fn user_id_reads_session() {
        let context = RequestContext {
            request_id: "r".into(),
            session: Some(SessionUser::new("u1", "Ana")),
        };
        assert_eq!(context.user_id(), Some("u1"));
        assert_eq!(RequestContext::default().user_id(), None);
    }
}

use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::problem::ProblemDetails;
use crate::{
    auth::session::SessionError, services::message_service::MessageServiceError,
    store::StoreError,
};

/// Handler result.
pub type AppResult<T> = Result<T, ApiError>;

/// Error returned by handlers, rendered as a problem document.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut problem = ProblemDetails::new(self.status, self.code, self.message);
        if let Some(details) = self.details {
            problem = problem.with_details(details);
        }

        problem.into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err
                .code()
                .unwrap_or_else(|| std::borrow::Cow::Borrowed("unknown"));
            let message = format!("database error {code}");
            return Self::internal_server_error(message)
                .with_details(json!({ "sqlstate": code }));
        }

        Self::internal_server_error(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(db_err) => Self::from(db_err),
            StoreError::Unavailable(reason) => Self::internal_server_error(reason),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Database(db_err) => Self::from(db_err),
        }
    }
}

impl From<MessageServiceError> for ApiError {
    fn from(err: MessageServiceError) -> Self {
        match err {
            MessageServiceError::Validation(message) => Self::validation(message),
            MessageServiceError::NotFound(message) => Self::not_found(message),
            MessageServiceError::Forbidden(message) => Self::forbidden(message),
            MessageServiceError::Store(store_err) => Self::from(store_err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use serde_json::Value;

    #[test]
    fn new_sets_fields_and_allows_details() {
        let error = ApiError::forbidden("nope").with_details(json!({ "reason": "policy" }));
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert_eq!(error.code(), "forbidden");
        assert!(
            error
                .details
                .as_ref()
                .is_some_and(|details| details["reason"] == Value::from("policy"))
        );
    }

    #[tokio::test]
    async fn into_response_serializes_problem_details() {
        let response = ApiError::not_found("response r9")
            .with_details(json!({ "channelId": "r9" }))
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body to bytes");
        let json: Value =
            serde_json::from_slice(&bytes).expect("problem details deserializes to json");
        assert_eq!(json["code"], "not_found");
        assert_eq!(json["message"], "response r9");
        assert_eq!(json["details"]["channelId"], "r9");
    }

    #[test]
    fn message_service_errors_map_to_matching_status_codes() {
        let validation = ApiError::from(MessageServiceError::Validation("bad".into()));
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.code(), "validation_failed");

        let not_found = ApiError::from(MessageServiceError::NotFound("missing".into()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let forbidden = ApiError::from(MessageServiceError::Forbidden("nope".into()));
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let store = ApiError::from(MessageServiceError::Store(StoreError::Database(
            sqlx::Error::PoolTimedOut,
        )));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.code(), "internal_error");
    }

    #[test]
    fn unauthorized_uses_stable_code() {
        let error = ApiError::unauthorized("missing session");
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.code(), "unauthorized");
    }
}

use std::sync::Arc;

use crate::{app_state::AppState, openapi::ApiDoc};
use axum::{
    Json, Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use utoipa::OpenApi;

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn openapi_yaml() -> impl IntoResponse {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/yaml")],
            yaml,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("YAML error: {e}"),
        ),
    }
}

/// Serves the OpenAPI document as JSON and YAML.
pub fn openapi_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/openapi/loadboard.json", get(openapi_json))
        .route("/openapi/loadboard.yaml", get(openapi_yaml))
}

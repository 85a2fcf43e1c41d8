use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Duration,
};

use axum::{
    Extension, Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::get,
    serve,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::server::{Config, DatabaseConfig, LogFormat, Profile};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    app_state::AppState,
    auth::session::{MemorySessionDirectory, PgSessionDirectory, SessionUser},
    db::bootstrap::{self, BootstrapError},
    middleware::request_context::{self, RequestIdState},
    routes,
    services::SystemClock,
    store::{memory::MemoryChatStore, postgres::PgChatStore},
    tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide Prometheus handle. The first caller installs the recorder.
pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("a metrics recorder was already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a database connection pool from the given database settings.
///
/// # Errors
/// Returns an error if the database connection pool cannot be created.
pub async fn create_database_pool(db: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_millis(db.statement_timeout_ms))
        .connect(&db.url)
        .await?;
    metrics::gauge!("db_pool_max_connections").set(f64::from(db.max_connections));
    Ok(pool)
}

/// Builds the shared state: Postgres-backed when `db.url` is set, in-process otherwise.
///
/// # Errors
/// Returns an error if the pool cannot be opened or bootstrap fails.
pub async fn build_state(config: Arc<Config>) -> Result<Arc<AppState>, ServerError> {
    let clock = Arc::new(SystemClock);

    if config.db.url.trim().is_empty() {
        info!("no database configured; using the in-process chat store");
        let store = Arc::new(MemoryChatStore::new());
        let sessions = Arc::new(MemorySessionDirectory::new());
        if config.profile == Profile::Dev {
            seed_memory_demo(&store, &sessions).await;
        }
        return Ok(Arc::new(AppState::new(config, store, sessions, clock)));
    }

    let pool = create_database_pool(&config.db).await?;
    bootstrap::ensure_liveness(&pool).await?;
    bootstrap::run(&pool, &config.db).await?;
    bootstrap::ensure_readiness(&pool).await?;

    let store = Arc::new(PgChatStore::new(pool.clone()));
    let sessions = Arc::new(PgSessionDirectory::new(pool.clone()));
    Ok(Arc::new(
        AppState::new(config, store, sessions, clock).with_pool(pool),
    ))
}

/// Mirrors `db/seed` so the in-process store is usable out of the box.
async fn seed_memory_demo(store: &MemoryChatStore, sessions: &MemorySessionDirectory) {
    for (id, name, token) in [
        ("u-carrier", "Carla Carrier", "dev-carrier"),
        ("u-customer", "Cody Customer", "dev-customer"),
        ("u-owner", "Olga Owner", "dev-owner"),
    ] {
        store.add_user(id, name).await;
        sessions.insert(token, SessionUser::new(id, name)).await;
    }
    store.add_response("r-1", "u-carrier", "u-customer").await;
    store.add_transport("t-1", "u-owner").await;
}

/// Creates the CORS layer for the application.
pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let cors_config = &config.server.cors;
    let mut cors = CorsLayer::new()
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_credentials(cors_config.allow_credentials)
        .max_age(Duration::from_secs(cors_config.max_age_seconds));

    // Credentialed CORS forbids wildcards, so mirror the request instead.
    cors = if cors_config.allow_credentials {
        cors.allow_headers(AllowHeaders::mirror_request())
    } else {
        cors.allow_headers(AllowHeaders::any())
    };

    if cors_config.allowed_origins.is_empty() {
        if cors_config.allow_credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
        } else {
            cors.allow_origin(AllowOrigin::any())
        }
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let config = state.config.clone();
    let cors = create_cors_layer(&config);
    let request_id_state = RequestIdState::from_config(&config);

    Router::new()
        .merge(routes::chat::create_chat_router(state.clone()))
        .merge(routes::health::create_health_router())
        .merge(routes::openapi::openapi_routes())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(metrics_handle))
        .layer(cors)
        .layer(tracer::create_trace_layer())
        .layer(axum::middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .with_state(state)
}

/// Resolves when a shutdown signal is received.
pub async fn create_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for CTRL+C; shutting down");
    }
    info!("Shutting down...");
}

/// Starts the server and serves until a shutdown signal arrives.
///
/// # Errors
/// Returns an error if state construction, binding, or serving fails.
pub async fn run(config: Config) -> Result<(), ServerError> {
    initialize_tracing(&config);
    info!(profile = ?config.profile, "Starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);
    let state = build_state(config.clone()).await?;
    let app = create_app_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}

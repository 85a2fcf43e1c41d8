use std::sync::Arc;

use shared::config::server::Config;
use sqlx::PgPool;

use crate::{
    auth::session::SessionDirectory,
    services::{ChatPoller, Clock, DeliveryCursors, MessageService, StalenessCache},
    store::ChatStore,
};

/// Application state shared across all routes.
///
/// The staleness cache and delivery cursors are built once here and shared
/// by every stream session the poller opens.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Option<PgPool>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub poller: ChatPoller,
    pub messages: MessageService,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ChatStore>,
        sessions: Arc<dyn SessionDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(StalenessCache::new(config.chat.cache_ttl(), clock.clone()));
        let cursors = Arc::new(DeliveryCursors::new());
        let poller = ChatPoller::new(store.clone(), cache, cursors, &config.chat);
        let messages = MessageService::new(store, clock);

        Self {
            config,
            pool: None,
            sessions,
            poller,
            messages,
        }
    }

    /// Attaches the pool used by the readiness probe.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

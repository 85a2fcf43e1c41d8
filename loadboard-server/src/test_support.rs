use std::sync::Arc;

use shared::config::server::{Config, Profile};

use crate::{
    app_state::AppState, auth::session::MemorySessionDirectory, services::SystemClock,
    store::memory::MemoryChatStore,
};

/// In-process state on the test profile, plus the store for seeding.
pub(crate) async fn memory_state() -> (Arc<AppState>, Arc<MemoryChatStore>) {
    let store = Arc::new(MemoryChatStore::new());
    store.add_user("u-carrier", "Carla Carrier").await;
    let state = AppState::new(
        Arc::new(Config::default_for_profile(Profile::Test)),
        store.clone(),
        Arc::new(MemorySessionDirectory::new()),
        Arc::new(SystemClock),
    );
    (Arc::new(state), store)
}

//! Per-channel bookmark of the newest delivered message timestamp.

use std::collections::HashMap;

use shared::models::Timestamp;
use tokio::sync::Mutex;

/// Delivery cursors of every channel seen by this process.
#[derive(Debug, Default)]
pub struct DeliveryCursors {
    cursors: Mutex<HashMap<String, Timestamp>>,
}

impl DeliveryCursors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` at the epoch if unseen and returns its current cursor.
    pub async fn track(&self, channel: &str) -> Timestamp {
        *self
            .cursors
            .lock()
            .await
            .entry(channel.to_string())
            .or_insert_with(Timestamp::epoch)
    }

    /// Current cursor of `channel`; the epoch for channels never tracked.
    pub async fn get(&self, channel: &str) -> Timestamp {
        self.cursors
            .lock()
            .await
            .get(channel)
            .copied()
            .unwrap_or_else(Timestamp::epoch)
    }

    /// Moves the cursor to `to`. Never moves backwards; returns the stored value.
    pub async fn advance(&self, channel: &str, to: Timestamp) -> Timestamp {
        let mut cursors = self.cursors.lock().await;
        let cursor = cursors
            .entry(channel.to_string())
            .or_insert_with(Timestamp::epoch);
        if to > *cursor {
            *cursor = to;
        }
        *cursor
    }
}

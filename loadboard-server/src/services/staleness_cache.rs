//! Short-lived cache of the last batch delivered per channel.
//!
//! A hit lets a tick skip the storage round trip. Entries are served while
//! their age is strictly below the TTL. An expired entry is evicted on the
//! first read of its channel or on the next write to any channel.
//! Writes overwrite unconditionally; empty batches are never stored so that
//! "nothing new" cannot mask a later update.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::models::ChannelMessage;
use tokio::sync::Mutex;

use super::clock::Clock;

/// A delivered batch and the clock time it was stored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBatch {
    pub messages: Vec<ChannelMessage>,
    pub produced_at: DateTime<Utc>,
}

/// Per-channel batch cache with a fixed TTL measured on the injected [`Clock`].
#[derive(Debug)]
pub struct StalenessCache {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CachedBatch>>,
}

impl StalenessCache {
    /// A TTL too large for `chrono` never expires.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the batch for `channel` if it is younger than the TTL.
    pub async fn get(&self, channel: &str) -> Option<CachedBatch> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let fresh = entries
            .get(channel)
            .is_some_and(|entry| now - entry.produced_at < self.ttl);

        if fresh {
            entries.get(channel).cloned()
        } else {
            entries.remove(channel);
            None
        }
    }

    /// Stores `messages` as the current batch for `channel`. Empty batches are dropped.
    ///
    /// Expired entries of other channels are swept on the way.
    pub async fn put(&self, channel: &str, messages: Vec<ChannelMessage>) {
        if messages.is_empty() {
            return;
        }

        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now - entry.produced_at < self.ttl);
        entries.insert(
            channel.to_string(),
            CachedBatch {
                messages,
                produced_at: now,
            },
        );
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

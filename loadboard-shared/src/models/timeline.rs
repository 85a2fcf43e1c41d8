//! Client-side accumulation of stream batches.
//!
//! The stream re-emits cached batches verbatim for as long as the cache entry
//! is fresh, so a viewer sees the same message ids more than once. Every client
//! folds batches through a [`MessageTimeline`] rather than appending them.

use std::collections::HashSet;

use super::{ChannelMessage, StreamEnvelope};

/// De-duplicated, creation-ordered view of a conversation.
#[derive(Debug, Clone, Default)]
pub struct MessageTimeline {
    seen: HashSet<String>,
    messages: Vec<ChannelMessage>,
}

impl MessageTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the timeline with history loaded before the stream opened.
    #[must_use]
    pub fn with_history(history: Vec<ChannelMessage>) -> Self {
        let mut timeline = Self::new();
        timeline.merge(history);
        timeline
    }

    /// Adds unseen messages and returns them in timeline order.
    pub fn merge(&mut self, batch: Vec<ChannelMessage>) -> Vec<ChannelMessage> {
        let mut added = Vec::new();
        for message in batch {
            if self.seen.insert(message.id.clone()) {
                added.push(message);
            }
        }

        if added.is_empty() {
            return added;
        }

        self.messages.extend(added.iter().cloned());
        self.messages
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        added.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        added
    }

    /// Applies one stream envelope; only `messages` envelopes change the timeline.
    pub fn apply(&mut self, envelope: StreamEnvelope) -> Vec<ChannelMessage> {
        match envelope {
            StreamEnvelope::Messages { data, .. } => self.merge(data),
            StreamEnvelope::Connected | StreamEnvelope::Error { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChannelMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamp;
    use chrono::{Duration, TimeZone, Utc};

    fn message(id: &str, offset_secs: i64) -> ChannelMessage {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        ChannelMessage {
            id: id.into(),
            content: format!("message {id}"),
            created_at: Timestamp(base + Duration::seconds(offset_secs)),
            sender_id: "u1".into(),
            sender_name: "Ana".into(),
        }
    }

    #[test]
    fn repeated_cached_batches_are_ignored() {
        let mut timeline = MessageTimeline::new();
        let batch = vec![message("m1", 0), message("m2", 1)];

        assert_eq!(
            timeline
                .apply(StreamEnvelope::fresh(batch.clone()))
                .len(),
            2
        );
        assert!(timeline.apply(StreamEnvelope::cached(batch.clone())).is_empty());
        assert!(timeline.apply(StreamEnvelope::cached(batch)).is_empty());
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn merge_keeps_creation_order() {
        let mut timeline = MessageTimeline::with_history(vec![message("m3", 3)]);
        timeline.merge(vec![message("m1", 1), message("m2", 2)]);

        let ids: Vec<_> = timeline.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn partially_overlapping_batch_returns_only_new_messages() {
        let mut timeline = MessageTimeline::with_history(vec![message("m1", 0)]);
        let added = timeline.merge(vec![message("m1", 0), message("m2", 5)]);

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "m2");
    }

    #[test]
    fn connected_and_error_do_not_change_timeline() {
        let mut timeline = MessageTimeline::new();
        assert!(timeline.apply(StreamEnvelope::Connected).is_empty());
        assert!(timeline.apply(StreamEnvelope::error("boom")).is_empty());
        assert!(timeline.is_empty());
    }
}

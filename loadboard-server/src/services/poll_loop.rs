//! Polling bridge that turns periodic storage reads into a push stream.
//!
//! Each [`StreamSession`] owns one task that announces itself with a
//! `connected` envelope and then ticks on a fixed period. A tick serves the
//! staleness cache when it holds a fresh batch; otherwise it queries storage
//! for messages strictly newer than the channel's delivery cursor, advances
//! the cursor and refreshes the cache. Empty ticks emit nothing and failing
//! ticks emit an `error` envelope without ending the session.
//!
//! Cached batches may repeat across ticks, so consumers de-duplicate by
//! message id (see [`shared::models::MessageTimeline`]).

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use futures_util::Stream;
use metrics::{counter, gauge};
use shared::{
    config::server::ChatConfig,
    models::{ChannelMessage, ConversationRef, StreamEnvelope},
};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, info_span, warn};

use super::{delivery_cursor::DeliveryCursors, staleness_cache::StalenessCache};
use crate::store::{ChatStore, MessageFilter};

/// Message carried by the `error` envelope when a tick fails.
pub const STREAM_ERROR_MESSAGE: &str = "Failed to fetch messages";

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fresh batch served from the staleness cache.
    Cached(Vec<ChannelMessage>),
    /// New messages read from storage.
    Delivered(Vec<ChannelMessage>),
    /// Nothing new.
    Idle,
    /// Storage query failed.
    Failed(String),
}

impl TickOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cached(_) => "cached",
            Self::Delivered(_) => "delivered",
            Self::Idle => "idle",
            Self::Failed(_) => "failed",
        }
    }

    /// The envelope this outcome puts on the wire, if any.
    #[must_use]
    pub fn into_envelope(self) -> Option<StreamEnvelope> {
        match self {
            Self::Cached(messages) => Some(StreamEnvelope::cached(messages)),
            Self::Delivered(messages) => Some(StreamEnvelope::fresh(messages)),
            Self::Idle => None,
            Self::Failed(_) => Some(StreamEnvelope::error(STREAM_ERROR_MESSAGE)),
        }
    }
}

/// Runs poll ticks and stream sessions over shared cache and cursor state.
///
/// Clones share the same cache, cursors and session counter.
#[derive(Debug, Clone)]
pub struct ChatPoller {
    store: Arc<dyn ChatStore>,
    cache: Arc<StalenessCache>,
    cursors: Arc<DeliveryCursors>,
    poll_interval: Duration,
    channel_capacity: usize,
    active: Arc<AtomicUsize>,
}

impl ChatPoller {
    /// Builds a poller that ticks every `config.poll_interval()`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        cache: Arc<StalenessCache>,
        cursors: Arc<DeliveryCursors>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            store,
            cache,
            cursors,
            poll_interval: config.poll_interval(),
            channel_capacity: config.channel_capacity.max(1),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Period between ticks of a session.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Cursors shared by all sessions of this poller.
    #[must_use]
    pub fn cursors(&self) -> &DeliveryCursors {
        &self.cursors
    }

    /// Cache shared by all sessions of this poller.
    #[must_use]
    pub fn cache(&self) -> &StalenessCache {
        &self.cache
    }

    /// Number of sessions whose task is still running.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Runs one poll step for `channel`.
    pub async fn tick(&self, channel: &str) -> TickOutcome {
        let outcome = self.poll(channel).await;
        counter!("loadboard_chat_ticks_total", "outcome" => outcome.label()).increment(1);
        if let TickOutcome::Delivered(messages) = &outcome {
            counter!("loadboard_chat_messages_delivered_total").increment(messages.len() as u64);
        }
        outcome
    }

    async fn poll(&self, channel: &str) -> TickOutcome {
        if let Some(batch) = self.cache.get(channel).await {
            if !batch.messages.is_empty() {
                debug!(count = batch.messages.len(), "serving cached batch");
                return TickOutcome::Cached(batch.messages);
            }
        }

        let conversation = ConversationRef::resolve(channel);
        let filter = MessageFilter::from(&conversation);
        let cursor = self.cursors.get(channel).await;

        match self.store.find_messages(&filter, Some(cursor)).await {
            Ok(messages) => {
                let Some(newest) = messages.last().map(|message| message.created_at) else {
                    return TickOutcome::Idle;
                };
                // The batch is cached before the cursor moves past it.
                self.cache.put(channel, messages.clone()).await;
                self.cursors.advance(channel, newest).await;
                debug!(count = messages.len(), cursor = %newest, "delivered new messages");
                TickOutcome::Delivered(messages)
            }
            Err(err) => {
                warn!(error = %err, %conversation, "chat poll failed");
                TickOutcome::Failed(err.to_string())
            }
        }
    }

    /// Starts a stream session for `channel`.
    ///
    /// The session stops when the returned handle is dropped.
    #[must_use]
    pub fn open(&self, channel: impl Into<String>) -> StreamSession {
        let channel = channel.into();
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let token = CancellationToken::new();
        let active = ActiveSession::enter(self.active.clone());

        let span = info_span!("chat.session", channel = %channel);
        let poller = self.clone();
        let task_token = token.clone();
        tokio::spawn(
            async move {
                let _active = active;
                poller.run(&channel, sender, task_token).await;
            }
            .instrument(span),
        );

        StreamSession {
            receiver,
            _guard: token.drop_guard(),
        }
    }

    async fn run(
        &self,
        channel: &str,
        sender: mpsc::Sender<StreamEnvelope>,
        token: CancellationToken,
    ) {
        self.cursors.track(channel).await;
        if sender.send(StreamEnvelope::Connected).await.is_err() {
            return;
        }
        debug!("chat session connected");

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = sender.closed() => break,
                _ = ticker.tick() => {}
            }

            // Cancellation is only observed between ticks.
            let outcome = self.tick(channel).await;

            let Some(envelope) = outcome.into_envelope() else {
                continue;
            };

            let sent = tokio::select! {
                biased;
                () = token.cancelled() => break,
                sent = sender.send(envelope) => sent,
            };
            if sent.is_err() {
                break;
            }
        }

        debug!("chat session closed");
    }
}

/// Keeps the active-session count and gauge in step with a running task.
struct ActiveSession(Arc<AtomicUsize>);

impl ActiveSession {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        gauge!("loadboard_chat_active_sessions").increment(1.0);
        Self(counter)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        gauge!("loadboard_chat_active_sessions").decrement(1.0);
    }
}

/// Receiving end of one stream session.
///
/// Yields envelopes in emission order. Dropping it cancels the session task.
#[derive(Debug)]
pub struct StreamSession {
    receiver: mpsc::Receiver<StreamEnvelope>,
    _guard: DropGuard,
}

impl StreamSession {
    /// Waits for the next envelope; `None` once the session task has ended.
    pub async fn next_envelope(&mut self) -> Option<StreamEnvelope> {
        self.receiver.recv().await
    }
}

impl Stream for StreamSession {
    type Item = StreamEnvelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

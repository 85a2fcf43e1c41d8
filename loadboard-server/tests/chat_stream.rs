//! End-to-end delivery through a stream session: write path in, envelopes out.

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use server::{
    app_state::AppState,
    auth::session::MemorySessionDirectory,
    services::{Clock, ManualClock, StreamSession},
    store::memory::MemoryChatStore,
};
use shared::{
    config::server::{Config, Profile},
    models::{
        ChannelMessage, ConversationKind, ConversationRef, CreatePrivateChatMessageRequest,
        CreateResponseMessageRequest, CreateTransportMessageRequest, GetOrCreatePrivateChatRequest,
        MessageTimeline, StreamEnvelope, Timestamp,
    },
};

const TICK: Duration = Duration::from_millis(7_000);

struct Marketplace {
    clock: Arc<ManualClock>,
    store: Arc<MemoryChatStore>,
    state: AppState,
}

async fn marketplace() -> Marketplace {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryChatStore::new());
    store.add_user("u-carrier", "Carla Carrier").await;
    store.add_user("u-customer", "Cody Customer").await;
    store.add_user("u-owner", "Olga Owner").await;
    store.add_response("r1", "u-carrier", "u-customer").await;
    store.add_transport("abc", "u-owner").await;

    let mut config = Config::default_for_profile(Profile::Dev);
    config.db.url = String::new();

    let state = AppState::new(
        Arc::new(config),
        store.clone(),
        Arc::new(MemorySessionDirectory::new()),
        clock.clone(),
    );
    Marketplace {
        clock,
        store,
        state,
    }
}

impl Marketplace {
    fn advance_clock(&self, millis: i64) {
        self.clock.advance(chrono::Duration::milliseconds(millis));
    }

    async fn post_response(&self, content: &str) -> ChannelMessage {
        self.state
            .messages
            .create_response_message(
                "u-carrier",
                CreateResponseMessageRequest {
                    content: content.into(),
                    response_id: "r1".into(),
                },
            )
            .await
            .unwrap()
    }
}

async fn connect(state: &AppState, channel: &str) -> StreamSession {
    let mut session = state.poller.open(channel);
    assert_eq!(session.next_envelope().await, Some(StreamEnvelope::Connected));
    session
}

async fn next_within(session: &mut StreamSession, window: Duration) -> Option<StreamEnvelope> {
    tokio::time::timeout(window, session.next_envelope())
        .await
        .ok()
        .flatten()
}

#[tokio::test(start_paused = true)]
async fn empty_thread_only_announces_connection() {
    let market = marketplace().await;
    let mut session = connect(&market.state, "r1").await;

    let within_one_tick = next_within(&mut session, TICK + Duration::from_millis(500)).await;
    assert_eq!(within_one_tick, None);
}

#[tokio::test(start_paused = true)]
async fn new_message_is_delivered_then_cached_until_ttl() {
    let market = marketplace().await;
    let mut session = connect(&market.state, "r1").await;

    let m1 = market.post_response("load ready at dock 4").await;
    let first = next_within(&mut session, TICK * 2).await;
    assert_eq!(first, Some(StreamEnvelope::fresh(vec![m1.clone()])));
    assert_eq!(market.state.poller.cursors().get("r1").await, m1.created_at);

    // m2 lands inside the staleness window and is not part of the cached batch.
    market.advance_clock(1_000);
    let m2 = market.post_response("eta 14:00").await;
    let stale = next_within(&mut session, TICK * 2).await;
    assert_eq!(stale, Some(StreamEnvelope::cached(vec![m1.clone()])));

    market.advance_clock(30_000);
    let refreshed = next_within(&mut session, TICK * 2).await;
    assert_eq!(refreshed, Some(StreamEnvelope::fresh(vec![m2.clone()])));
    assert_eq!(market.state.poller.cursors().get("r1").await, m2.created_at);
}

#[tokio::test(start_paused = true)]
async fn cached_batch_is_served_just_below_ttl_and_dropped_at_ttl() {
    let market = marketplace().await;
    let mut session = connect(&market.state, "r1").await;

    let m1 = market.post_response("first").await;
    assert_eq!(
        next_within(&mut session, TICK * 2).await,
        Some(StreamEnvelope::fresh(vec![m1.clone()]))
    );

    market.advance_clock(29_999);
    assert_eq!(
        next_within(&mut session, TICK * 2).await,
        Some(StreamEnvelope::cached(vec![m1]))
    );

    // At exactly the TTL the entry is gone and nothing newer exists.
    market.advance_clock(1);
    assert_eq!(next_within(&mut session, TICK + Duration::from_millis(500)).await, None);
    assert!(market.state.poller.cache().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn second_viewer_on_a_later_phase_gets_the_batch_from_cache() {
    let market = marketplace().await;
    let mut early = connect(&market.state, "r1").await;
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    let mut late = connect(&market.state, "r1").await;

    let m1 = market.post_response("truck at the gate").await;

    // The early session ticks first and reads storage.
    assert_eq!(
        next_within(&mut early, TICK).await,
        Some(StreamEnvelope::fresh(vec![m1.clone()]))
    );
    assert_eq!(market.state.poller.cursors().get("r1").await, m1.created_at);

    // Three seconds later the cursor is past m1, so only the cache carries it.
    assert_eq!(
        next_within(&mut late, TICK).await,
        Some(StreamEnvelope::cached(vec![m1]))
    );
}

#[tokio::test(start_paused = true)]
async fn leaving_viewer_does_not_take_the_batch_with_it() {
    let market = marketplace().await;
    let mut early = connect(&market.state, "r1").await;
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    let mut late = connect(&market.state, "r1").await;

    let m1 = market.post_response("paperwork signed").await;
    assert_eq!(
        next_within(&mut early, TICK).await,
        Some(StreamEnvelope::fresh(vec![m1.clone()]))
    );
    drop(early);

    assert_eq!(
        next_within(&mut late, TICK).await,
        Some(StreamEnvelope::cached(vec![m1]))
    );
    assert_eq!(market.state.poller.active_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn batches_arrive_in_ascending_order() {
    let market = marketplace().await;
    let mut session = connect(&market.state, "r1").await;

    let mut posted = Vec::new();
    for step in 0..4 {
        posted.push(market.post_response(&format!("update {step}")).await);
        market.advance_clock(250);
    }

    let Some(StreamEnvelope::Messages { data, cached }) = next_within(&mut session, TICK * 2).await
    else {
        panic!("expected a messages envelope");
    };
    assert!(!cached);
    assert_eq!(data, posted);
    assert!(data.windows(2).all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[tokio::test(start_paused = true)]
async fn every_conversation_kind_streams_its_own_messages() {
    let market = marketplace().await;
    let mut response = connect(&market.state, "r1").await;
    let mut transport = connect(&market.state, "transport-abc").await;

    let chat = market
        .state
        .messages
        .get_or_create_private_chat(
            "u-carrier",
            GetOrCreatePrivateChatRequest {
                transport_id: "abc".into(),
                owner_id: "u-owner".into(),
            },
        )
        .await
        .unwrap();
    let private_channel = chat.conversation().channel_id();
    let mut private = connect(&market.state, &private_channel).await;

    let public = market
        .state
        .messages
        .create_transport_message(
            "u-customer",
            CreateTransportMessageRequest {
                content: "is this lane still open?".into(),
                transport_id: "abc".into(),
            },
        )
        .await
        .unwrap();
    let direct = market
        .state
        .messages
        .create_private_chat_message(
            "u-owner",
            CreatePrivateChatMessageRequest {
                chat_id: chat.id.clone(),
                content: "yes, 2 pallets left".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        next_within(&mut transport, TICK * 2).await,
        Some(StreamEnvelope::fresh(vec![public]))
    );
    assert_eq!(
        next_within(&mut private, TICK * 2).await,
        Some(StreamEnvelope::fresh(vec![direct]))
    );
    assert_eq!(next_within(&mut response, TICK * 2).await, None);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_emits_error_and_session_recovers() {
    let market = marketplace().await;
    let mut session = connect(&market.state, "r1").await;

    market.store.fail_reads(Some("connection reset")).await;
    assert_eq!(
        next_within(&mut session, TICK * 2).await,
        Some(StreamEnvelope::error("Failed to fetch messages"))
    );

    market.store.fail_reads(None).await;
    let m1 = market.post_response("back online").await;
    assert_eq!(
        next_within(&mut session, TICK * 2).await,
        Some(StreamEnvelope::fresh(vec![m1]))
    );
}

#[tokio::test(start_paused = true)]
async fn timeline_deduplicates_replayed_batches() {
    let market = marketplace().await;
    let history = market.post_response("before connect").await;
    let mut timeline = MessageTimeline::with_history(vec![history.clone()]);

    let mut session = connect(&market.state, "r1").await;

    // The cursor starts at epoch, so the first batch repeats history.
    let first = next_within(&mut session, TICK * 2).await.unwrap();
    assert!(timeline.apply(first).is_empty());

    market.advance_clock(500);
    let later = market.post_response("after connect").await;
    let replay = next_within(&mut session, TICK * 2).await.unwrap();
    assert!(matches!(replay, StreamEnvelope::Messages { cached: true, .. }));
    assert!(timeline.apply(replay).is_empty());

    market.advance_clock(30_000);
    let fresh = next_within(&mut session, TICK * 2).await.unwrap();
    assert_eq!(timeline.apply(fresh), vec![later.clone()]);
    assert_eq!(timeline.messages(), &[history, later]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_ends_polling() {
    let market = marketplace().await;
    let session = connect(&market.state, "r1").await;
    assert_eq!(market.state.poller.active_sessions(), 1);

    drop(session);
    for _ in 0..10 {
        if market.state.poller.active_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(market.state.poller.active_sessions(), 0);
}

#[test]
fn channel_ids_decode_to_their_conversation_kind() {
    let cases = [
        ("transport-abc", ConversationKind::TransportThread, "abc"),
        ("private-chat-xyz", ConversationKind::PrivateChat, "xyz"),
        ("r9", ConversationKind::ResponseThread, "r9"),
    ];
    for (channel, kind, id) in cases {
        let resolved = ConversationRef::resolve(channel);
        assert_eq!(resolved.kind(), kind, "{channel}");
        assert_eq!(resolved.underlying_id(), id, "{channel}");
    }
}

#[tokio::test]
async fn write_path_stamps_messages_with_the_clock() {
    let market = marketplace().await;
    let message = market.post_response("stamped").await;
    assert_eq!(message.created_at, Timestamp(market.clock.now()));
    assert_eq!(message.sender_name, "Carla Carrier");
}

use super::*;

use std::cell::Cell;
use std::collections::VecDeque;

use async_trait::async_trait;
use frames::Envelope;
use futures_util::stream;
use serde_json::json;
use tokio::task::LocalSet;

use crate::net::reconnect::ReconnectPolicy;
use crate::net::sse::SseStream;
use crate::net::types::Conversation;

// =============================================================================
// Scripted source
// =============================================================================

enum Script {
    /// Open fails with a 503.
    Fail,
    /// Open succeeds, yields the frames, then stays open.
    Hold(Vec<SseEvent>),
    /// Open succeeds, yields the frames, then the body ends.
    Close(Vec<SseEvent>),
}

#[derive(Clone, Default)]
struct OpenLog {
    opens: Rc<Cell<usize>>,
    urls: Rc<RefCell<Vec<String>>>,
}

impl OpenLog {
    fn opens(&self) -> usize {
        self.opens.get()
    }
}

struct ScriptedSource {
    scripts: RefCell<VecDeque<Script>>,
    log: OpenLog,
}

#[async_trait(?Send)]
impl EventSource for ScriptedSource {
    async fn open(&self, url: &Url) -> Result<SseStream, TransportError> {
        self.log.opens.set(self.log.opens.get() + 1);
        self.log.urls.borrow_mut().push(url.to_string());

        let next = self.scripts.borrow_mut().pop_front();
        match next {
            Some(Script::Hold(frames)) => {
                Ok(Box::pin(stream::iter(frames.into_iter().map(Ok)).chain(stream::pending())))
            }
            Some(Script::Close(frames)) => Ok(Box::pin(stream::iter(frames.into_iter().map(Ok)))),
            Some(Script::Fail) | None => Err(TransportError::Status(503)),
        }
    }
}

fn channel_with(scripts: Vec<Script>, stores: Stores) -> (EventChannel<ScriptedSource>, OpenLog) {
    let log = OpenLog::default();
    let source = ScriptedSource { scripts: RefCell::new(scripts.into()), log: log.clone() };
    let config = ChannelConfig {
        base_url: "https://inbox.example.test".to_owned(),
        reconnect: ReconnectPolicy::default(),
        ..ChannelConfig::default()
    };
    (EventChannel::new(config, source, stores), log)
}

fn frame(kind: &str, data: serde_json::Value) -> SseEvent {
    let mut envelope = Envelope::new(kind, data);
    envelope.organization_id = Some("org-1".to_owned());
    SseEvent { event: Some(kind.to_owned()), data: frames::encode_body(&envelope), id: None }
}

fn session() -> Session {
    Session::new("tok-1", "org-1")
}

fn seeded(ids: &[&str]) -> Stores {
    let stores = Stores::default();
    stores.inbox.update(|inbox| inbox.load(ids.iter().map(|id| Conversation::new(*id)).collect()));
    stores
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn advance_to(start: tokio::time::Instant, offset: Duration) {
    tokio::time::sleep_until(start + offset).await;
}

// =============================================================================
// Activation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn inert_without_authenticated_session() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) = channel_with(vec![Script::Hold(Vec::new())], Stores::default());

            assert!(!channel.activate(&Session::default()));
            let mut no_org = session();
            no_org.organization_id = Some("   ".to_owned());
            assert!(!channel.activate(&no_org));
            let mut no_token = session();
            no_token.token = None;
            assert!(!channel.activate(&no_token));
            tokio::time::sleep(Duration::from_secs(30)).await;

            assert_eq!(log.opens(), 0);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert!(!channel.has_pending_retry());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn activation_connects_with_token_in_url() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) = channel_with(vec![Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            assert_eq!(channel.connection_state(), ConnectionState::Connecting);
            settle().await;

            assert_eq!(channel.connection_state(), ConnectionState::Connected);
            assert_eq!(channel.reconnect_attempts(), 0);
            assert_eq!(log.urls.borrow().as_slice(), ["https://inbox.example.test/api/events?token=tok-1"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn reactivation_keeps_a_single_connection() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) =
                channel_with(vec![Script::Hold(Vec::new()), Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            assert!(channel.activate(&session()));
            settle().await;

            assert_eq!(log.opens(), 1);
            assert_eq!(channel.connection_state(), ConnectionState::Connected);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn invalid_base_url_leaves_channel_inert() {
    LocalSet::new()
        .run_until(async {
            let log = OpenLog::default();
            let source = ScriptedSource { scripts: RefCell::new(VecDeque::new()), log: log.clone() };
            let config = ChannelConfig { base_url: "not a url".to_owned(), ..ChannelConfig::default() };
            let channel = EventChannel::new(config, source, Stores::default());

            assert!(!channel.activate(&session()));
            settle().await;

            assert_eq!(log.opens(), 0);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
        })
        .await;
}

// =============================================================================
// Frame routing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn new_message_frame_appends_to_conversation() {
    LocalSet::new()
        .run_until(async {
            let stores = seeded(&["c1", "c2"]);
            let before = stores.inbox.with(|i| i.conversation("c1").expect("c1").messages.len());
            let message = frame(
                "NewMessage",
                json!({"conversationId": "c1", "message": {"uniqueId": "m1", "text": "hello"}}),
            );
            let (channel, _log) = channel_with(vec![Script::Hold(vec![message])], stores.clone());

            assert!(channel.activate(&session()));
            settle().await;

            stores.inbox.with(|inbox| {
                let c1 = inbox.conversation("c1").expect("c1");
                assert_eq!(c1.messages.len(), before + 1);
                assert_eq!(c1.messages.last().map(|m| m.unique_id.as_str()), Some("m1"));
            });
            let stats = channel.stats();
            assert_eq!(stats.frames_received, 1);
            assert_eq!(stats.events_applied, 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn error_frame_raises_one_notification() {
    LocalSet::new()
        .run_until(async {
            let stores = Stores::default();
            let error = frame("Error", json!({"message": "boom"}));
            let (channel, _log) = channel_with(vec![Script::Hold(vec![error])], stores.clone());

            assert!(channel.activate(&session()));
            settle().await;

            let ui = stores.ui.get();
            assert_eq!(ui.notifications.len(), 1);
            assert_eq!(ui.notifications[0].message, "boom");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn invalid_frames_are_dropped_without_state_change() {
    LocalSet::new()
        .run_until(async {
            let stores = seeded(&["c1"]);
            let inbox_before = stores.inbox.get();
            let frames = vec![
                SseEvent { event: Some("NewMessage".to_owned()), data: "%%%".to_owned(), id: None },
                frame("NewMessage", json!({"conversationId": "c1"})),
                frame("Bogus", json!({})),
                frame("NewMessage", json!({"conversationId": "zz", "message": {"uniqueId": "m9"}})),
                frame("ChatAssignment", json!(["c1"])),
            ];
            let (channel, _log) = channel_with(vec![Script::Hold(frames)], stores.clone());

            assert!(channel.activate(&session()));
            settle().await;

            assert_eq!(stores.inbox.get(), inbox_before);
            assert_eq!(
                channel.stats(),
                ChannelStats { frames_received: 5, frames_dropped: 4, events_applied: 0, events_skipped: 1 }
            );
            assert_eq!(channel.connection_state(), ConnectionState::Connected);
        })
        .await;
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_failures() {
    LocalSet::new()
        .run_until(async {
            let scripts = (0..8).map(|_| Script::Fail).collect();
            let (channel, log) = channel_with(scripts, Stores::default());

            assert!(channel.activate(&session()));
            tokio::time::sleep(Duration::from_secs(60)).await;

            assert_eq!(log.opens(), 5);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert!(!channel.has_pending_retry());
            assert!(channel.is_exhausted());

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(log.opens(), 5);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn retry_waits_the_fixed_delay_and_recovery_resets_counter() {
    LocalSet::new()
        .run_until(async {
            let start = tokio::time::Instant::now();
            let (channel, log) =
                channel_with(vec![Script::Fail, Script::Fail, Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            settle().await;
            assert_eq!(log.opens(), 1);
            assert_eq!(channel.reconnect_attempts(), 1);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert!(channel.has_pending_retry());

            advance_to(start, Duration::from_millis(4_900)).await;
            assert_eq!(log.opens(), 1);

            advance_to(start, Duration::from_millis(5_100)).await;
            assert_eq!(log.opens(), 2);
            assert_eq!(channel.reconnect_attempts(), 2);

            advance_to(start, Duration::from_millis(10_100)).await;
            assert_eq!(log.opens(), 3);
            assert_eq!(channel.connection_state(), ConnectionState::Connected);
            assert_eq!(channel.reconnect_attempts(), 0);
            assert!(!channel.has_pending_retry());
            assert!(!channel.is_exhausted());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn stream_end_schedules_reconnect() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) =
                channel_with(vec![Script::Close(Vec::new()), Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            settle().await;
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert_eq!(channel.reconnect_attempts(), 1);
            assert!(channel.has_pending_retry());

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(log.opens(), 2);
            assert_eq!(channel.connection_state(), ConnectionState::Connected);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn state_changes_reach_subscribers() {
    LocalSet::new()
        .run_until(async {
            let (channel, _log) = channel_with(vec![Script::Hold(Vec::new())], Stores::default());
            let mut rx = channel.subscribe_state();
            assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);

            assert!(channel.activate(&session()));
            assert!(rx.has_changed().expect("sender alive"));
            assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

            settle().await;
            assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);

            channel.teardown();
            assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
        })
        .await;
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn teardown_cancels_pending_retry_and_is_idempotent() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) = channel_with(vec![Script::Fail, Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            settle().await;
            assert!(channel.has_pending_retry());

            channel.teardown();
            channel.teardown();

            assert!(!channel.has_pending_retry());
            assert_eq!(channel.reconnect_attempts(), 0);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(log.opens(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn teardown_closes_live_connection_without_retry() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) = channel_with(vec![Script::Hold(Vec::new())], Stores::default());

            assert!(channel.activate(&session()));
            settle().await;
            assert_eq!(channel.connection_state(), ConnectionState::Connected);

            channel.teardown();
            tokio::time::sleep(Duration::from_secs(30)).await;

            assert_eq!(log.opens(), 1);
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert!(!channel.has_pending_retry());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn teardown_before_activation_is_a_no_op() {
    LocalSet::new()
        .run_until(async {
            let (channel, log) = channel_with(Vec::new(), Stores::default());
            channel.teardown();
            assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
            assert_eq!(log.opens(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn reactivation_after_exhaustion_starts_fresh() {
    LocalSet::new()
        .run_until(async {
            let mut scripts: Vec<Script> = (0..5).map(|_| Script::Fail).collect();
            scripts.push(Script::Hold(Vec::new()));
            let (channel, log) = channel_with(scripts, Stores::default());

            assert!(channel.activate(&session()));
            tokio::time::sleep(Duration::from_secs(60)).await;
            assert!(channel.is_exhausted());

            assert!(channel.activate(&session()));
            settle().await;
            assert_eq!(log.opens(), 6);
            assert!(!channel.is_exhausted());
            assert_eq!(channel.connection_state(), ConnectionState::Connected);
        })
        .await;
}

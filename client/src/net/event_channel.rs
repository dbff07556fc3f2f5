//! Realtime event channel for the inbox.
//!
//! The `EventChannel` owns one server-sent event stream per authenticated
//! session: it opens the stream, decodes and validates every frame, routes
//! each validated event to its handler, and reconnects on transport failure
//! with a bounded, fixed-delay retry loop.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs on a single-threaded host: every task is spawned with
//! `tokio::task::spawn_local`, so the channel must be driven from inside a
//! `tokio::task::LocalSet`. Handlers write into the injected [`Stores`];
//! nothing else writes the connection state, which consumers observe through
//! [`EventChannel::subscribe_state`].
//!
//! DESIGN
//! ======
//! Exactly one connection task handle and one retry timer handle live in the
//! channel. Scheduling a retry aborts any timer still pending, teardown aborts
//! both, and a generation counter stops a superseded connection task from
//! driving state after teardown or re-activation.
//!
//! ERROR HANDLING
//! ==============
//! Frames that fail decoding or validation are logged and dropped without
//! touching state. Transport failures feed the [`Reconnector`]; once it is
//! exhausted the channel stays `Disconnected` until re-activated.

#[path = "event_channel_handlers.rs"]
mod event_channel_handlers;
#[path = "event_channel_parse.rs"]
mod event_channel_parse;

pub use self::event_channel_parse::{FrameError, parse_frame, validate_payload};

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Url;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use self::event_channel_handlers::dispatch_event;
use super::reconnect::{ConnectionState, Reconnector, RetryDecision};
use super::sse::{EventSource, SseEvent, TransportError};
use crate::config::ChannelConfig;
use crate::state::Stores;
use crate::state::session::Session;

/// Frame counters since the channel was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub frames_received: u64,
    /// Frames rejected by decoding or schema validation.
    pub frames_dropped: u64,
    /// Validated events applied or acknowledged by their handler.
    pub events_applied: u64,
    /// Validated events that referred to state not held locally.
    pub events_skipped: u64,
}

pub struct EventChannel<S> {
    inner: Rc<RefCell<Inner<S>>>,
}

struct Inner<S> {
    config: ChannelConfig,
    source: Rc<S>,
    stores: Stores,
    reconnector: Reconnector,
    url: Option<Url>,
    generation: u64,
    connection: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
    state_tx: watch::Sender<ConnectionState>,
    stats: ChannelStats,
}

impl<S> Inner<S> {
    fn publish_state(&self) {
        let next = self.reconnector.state();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if let Some(connection) = self.connection.take() {
            connection.abort();
        }
    }
}

impl<S> Clone for EventChannel<S> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<S: EventSource + 'static> EventChannel<S> {
    #[must_use]
    pub fn new(config: ChannelConfig, source: S, stores: Stores) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let reconnector = Reconnector::new(config.reconnect);
        let inner = Inner {
            config,
            source: Rc::new(source),
            stores,
            reconnector,
            url: None,
            generation: 0,
            connection: None,
            retry: None,
            state_tx,
            stats: ChannelStats::default(),
        };
        Self { inner: Rc::new(RefCell::new(inner)) }
    }

    /// Start streaming for `session`.
    ///
    /// Returns `false` and stays inert when the session lacks a token or an
    /// organization, or when the stream URL cannot be built. Any previous
    /// activation is torn down first, so at most one connection exists.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `tokio::task::LocalSet`.
    pub fn activate(&self, session: &Session) -> bool {
        if !session.is_authenticated() {
            tracing::debug!("event channel inert: no authenticated session");
            return false;
        }

        self.teardown();

        let url = match self.inner.borrow().config.stream_url(session.token().unwrap_or_default()) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "event channel cannot build stream URL");
                return false;
            }
        };

        tracing::info!(organization_id = session.organization_id(), "event channel activated");
        self.inner.borrow_mut().url = Some(url);
        self.connect();
        true
    }

    /// Stop streaming: cancel any pending retry, close the connection, reset
    /// the attempt counter. Safe to call any number of times.
    pub fn teardown(&self) {
        let mut inner = self.inner.borrow_mut();
        let was_active = inner.url.is_some() || inner.connection.is_some() || inner.retry.is_some();

        if let Some(retry) = inner.retry.take() {
            retry.abort();
        }
        if let Some(connection) = inner.connection.take() {
            connection.abort();
        }
        inner.generation = inner.generation.wrapping_add(1);
        inner.url = None;
        inner.reconnector.reset();
        inner.publish_state();

        if was_active {
            tracing::info!(stats = ?inner.stats, "event channel torn down");
        }
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.borrow().reconnector.state()
    }

    /// Receiver that observes every connection state change.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.borrow().state_tx.subscribe()
    }

    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.borrow().reconnector.attempts()
    }

    /// Whether a retry timer is scheduled and has not fired yet.
    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        self.inner.borrow().retry.as_ref().is_some_and(|retry| !retry.is_finished())
    }

    /// Whether the retry ceiling was reached and the channel gave up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.inner.borrow().reconnector.is_exhausted()
    }

    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        self.inner.borrow().stats
    }

    #[must_use]
    pub fn stores(&self) -> Stores {
        self.inner.borrow().stores.clone()
    }

    fn connect(&self) {
        let mut inner = self.inner.borrow_mut();
        // Called from the retry timer itself; its handle is spent.
        inner.retry = None;

        let Some(url) = inner.url.clone() else {
            return;
        };
        if !inner.reconnector.begin_connect() {
            return;
        }
        if let Some(stale) = inner.connection.take() {
            stale.abort();
        }
        inner.publish_state();
        inner.generation = inner.generation.wrapping_add(1);

        tracing::info!(
            attempt = inner.reconnector.attempts(),
            path = url.path(),
            "connecting to event stream"
        );
        let task = run_connection(Rc::downgrade(&self.inner), Rc::clone(&inner.source), url, inner.generation);
        inner.connection = Some(tokio::task::spawn_local(task));
    }

    fn on_transport_error(&self, generation: u64, error: &TransportError) {
        let mut inner = self.inner.borrow_mut();
        if inner.generation != generation {
            return;
        }
        // The failing task is the one holding this handle; let it finish.
        inner.connection = None;

        let decision = inner.reconnector.on_transport_error();
        inner.publish_state();
        let max_attempts = inner.reconnector.policy().max_attempts;
        drop(inner);

        match decision {
            RetryDecision::Retry { attempt, delay } => {
                tracing::warn!(error = %error, attempt, max_attempts, delay_secs = delay.as_secs(), "event stream failed; retrying");
                self.schedule_retry(delay);
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::warn!(error = %error, attempts, "event stream failed; giving up");
            }
        }
    }

    fn schedule_retry(&self, delay: Duration) {
        let channel = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();
        if let Some(previous) = inner.retry.take() {
            previous.abort();
        }
        inner.retry = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = channel.upgrade() {
                EventChannel { inner }.connect();
            }
        }));
    }
}

/// Run `f` against the channel if it still exists and `generation` is current.
fn with_current<S, R>(
    channel: &Weak<RefCell<Inner<S>>>,
    generation: u64,
    f: impl FnOnce(&mut Inner<S>) -> R,
) -> Option<R> {
    let inner = channel.upgrade()?;
    let mut inner = inner.borrow_mut();
    (inner.generation == generation).then(|| f(&mut inner))
}

async fn run_connection<S: EventSource + 'static>(
    channel: Weak<RefCell<Inner<S>>>,
    source: Rc<S>,
    url: Url,
    generation: u64,
) {
    let failure = match source.open(&url).await {
        Ok(mut stream) => {
            let opened = with_current(&channel, generation, |inner| {
                inner.reconnector.on_open();
                inner.publish_state();
                inner.stores.clone()
            });
            let Some(stores) = opened else {
                return;
            };
            tracing::info!("event stream open");

            loop {
                match stream.next().await {
                    Some(Ok(frame)) => {
                        if !process_frame(&channel, generation, &stores, &frame) {
                            return;
                        }
                    }
                    Some(Err(e)) => break e,
                    None => break TransportError::Closed,
                }
            }
        }
        Err(e) => e,
    };

    if let Some(inner) = channel.upgrade() {
        EventChannel { inner }.on_transport_error(generation, &failure);
    }
}

/// Decode, validate and dispatch one frame. Returns `false` once this
/// connection has been superseded.
fn process_frame<S>(channel: &Weak<RefCell<Inner<S>>>, generation: u64, stores: &Stores, frame: &SseEvent) -> bool {
    if with_current(channel, generation, |inner| inner.stats.frames_received += 1).is_none() {
        return false;
    }

    let applied = match parse_frame(frame) {
        Ok(inbound) => Some(dispatch_event(inbound, stores)),
        Err(e) => {
            tracing::warn!(error = %e, event = frame.event.as_deref(), id = frame.id.as_deref(), "dropping invalid frame");
            None
        }
    };

    with_current(channel, generation, |inner| match applied {
        Some(true) => inner.stats.events_applied += 1,
        Some(false) => inner.stats.events_skipped += 1,
        None => inner.stats.frames_dropped += 1,
    })
    .is_some()
}

#[cfg(test)]
#[path = "event_channel_test.rs"]
mod event_channel_test;

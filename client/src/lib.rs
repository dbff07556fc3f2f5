//! Realtime event channel for the inbox dashboard.
//!
//! Build a [`net::event_channel::EventChannel`] from a
//! [`config::ChannelConfig`], an [`net::sse::EventSource`] and the
//! [`state::Stores`] it should write into, then `activate` it with a
//! [`state::session::Session`] from inside a `tokio::task::LocalSet`.

pub mod config;
pub mod net;
pub mod state;

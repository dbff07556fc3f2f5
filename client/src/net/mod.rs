//! Networking modules for the realtime event stream.
//!
//! SYSTEM CONTEXT
//! ==============
//! `sse` reads server-sent events off an HTTP response, `events` defines the
//! typed event kinds and payloads, `reconnect` is the connection state
//! machine, `event_channel` drives all three, and `types` holds the inbox
//! domain records carried in payloads.

pub mod event_channel;
pub mod events;
pub mod reconnect;
pub mod sse;
pub mod types;

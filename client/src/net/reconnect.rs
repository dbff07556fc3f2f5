//! Reconnect state machine for the event channel.
//!
//! DESIGN
//! ======
//! Pure bookkeeping: no I/O and no timers. The channel owns the actual
//! connection task and retry timer and asks the [`Reconnector`] what to do on
//! each transport signal.
//!
//! ```text
//! Disconnected --begin_connect--> Connecting --on_open--> Connected
//!      ^                               |                      |
//!      +-------- on_transport_error ---+----------------------+
//! ```
//!
//! Every transport error bumps the attempt counter; once it reaches
//! `max_attempts` the machine is exhausted and refuses further connects until
//! [`Reconnector::reset`].

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod reconnect_test;

use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection lifecycle as shown by UI indicators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Retry ceiling and fixed delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS, retry_delay: DEFAULT_RETRY_DELAY }
    }
}

/// What the channel should do after a transport error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule one retry after `delay`; `attempt` is the updated counter.
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached; stay disconnected.
    GiveUp { attempts: u32 },
}

#[derive(Clone, Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    exhausted: bool,
}

impl Reconnector {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, state: ConnectionState::Disconnected, attempts: 0, exhausted: false }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Move to `Connecting`. Returns `false` (and changes nothing) once exhausted.
    pub fn begin_connect(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Transport reported open: counter resets.
    pub fn on_open(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connected;
    }

    /// Transport failed or closed.
    pub fn on_transport_error(&mut self) -> RetryDecision {
        self.state = ConnectionState::Disconnected;
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.policy.max_attempts {
            self.exhausted = true;
            return RetryDecision::GiveUp { attempts: self.attempts };
        }
        RetryDecision::Retry { attempt: self.attempts, delay: self.policy.retry_delay }
    }

    /// Back to a fresh `Disconnected` machine (teardown).
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.attempts = 0;
        self.exhausted = false;
    }
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

//! Dashboard-wide UI flags driven by the event stream.
//!
//! DESIGN
//! ======
//! Keeps user-facing signals (notifications, reload prompt) out of inbox data
//! so presentation can evolve independently of conversation state.

#[cfg(test)]
#[path = "ui_test.rs"]
mod ui_test;

use uuid::Uuid;

/// A user-visible notification raised by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    /// Notifications not yet dismissed, oldest first.
    pub notifications: Vec<Notification>,
    /// Set when the server asks the dashboard to reload from scratch.
    pub reload_required: bool,
}

impl UiState {
    /// Queue a notification and return its id.
    pub fn push_notification(&mut self, message: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.notifications.push(Notification { id, message: message.into() });
        id
    }

    /// Remove a notification. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }

    /// Clear the reload prompt once the consumer has acted on it.
    pub fn acknowledge_reload(&mut self) {
        self.reload_required = false;
    }
}

//! Conversation inbox held by the dashboard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Seeded from the REST conversation list and kept live by `event_channel`.
//! The channel only appends messages and prepends conversations; it never
//! reorders or removes existing messages.

#[cfg(test)]
#[path = "inbox_test.rs"]
mod inbox_test;

use crate::net::types::{Conversation, Message};

/// Conversations in display order (newest first).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InboxState {
    pub conversations: Vec<Conversation>,
}

impl InboxState {
    /// Replace the collection wholesale, e.g. after a REST fetch.
    pub fn load(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    #[must_use]
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Append `message` to the conversation with `conversation_id`.
    ///
    /// Returns `false` and leaves state untouched when the conversation is
    /// not held locally.
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> bool {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == conversation_id) else {
            return false;
        };
        conversation.messages.push(message);
        true
    }

    /// Put `conversation` at the head of the list.
    ///
    /// A held record with the same id is replaced, so the id appears exactly once.
    pub fn prepend_conversation(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }
}

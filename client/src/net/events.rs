//! Closed set of event kinds pushed over the inbox stream, and their payloads.
//!
//! DESIGN
//! ======
//! Each wire name maps to exactly one [`EventKind`], and each kind to exactly
//! one payload schema. [`Event`] is the validated sum type handed to dispatch;
//! a new kind fails to compile until every `match` over `Event` handles it.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{Conversation, Message, deserialize_u64_from_number};

/// Event kinds the backend pushes. Wire names are case-sensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewNotification,
    NewMessage,
    ChatAssignment,
    ChatUnAssignment,
    Error,
    ReloadRequired,
    ConversationClosed,
    NewConversation,
    CampaignProgress,
}

impl EventKind {
    /// Every kind, in wire-documentation order.
    pub const ALL: [Self; 9] = [
        Self::NewNotification,
        Self::NewMessage,
        Self::ChatAssignment,
        Self::ChatUnAssignment,
        Self::Error,
        Self::ReloadRequired,
        Self::ConversationClosed,
        Self::NewConversation,
        Self::CampaignProgress,
    ];

    /// Wire name used as the SSE `event:` field.
    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::NewNotification => "NewNotification",
            Self::NewMessage => "NewMessage",
            Self::ChatAssignment => "ChatAssignment",
            Self::ChatUnAssignment => "ChatUnAssignment",
            Self::Error => "Error",
            Self::ReloadRequired => "ReloadRequired",
            Self::ConversationClosed => "ConversationClosed",
            Self::NewConversation => "NewConversation",
            Self::CampaignProgress => "CampaignProgress",
        }
    }

    /// Parse a wire name. Matching is exact; `"newmessage"` is not a kind.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_wire() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// `NewNotification` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `NewMessage` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub conversation_id: String,
    pub message: Message,
}

/// `ChatAssignment` / `ChatUnAssignment` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPayload {
    pub conversation_id: String,
    /// Assignee user id; absent on unassignment.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// `Error` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}

/// `ReloadRequired` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadRequiredPayload {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `ConversationClosed` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationClosedPayload {
    pub conversation_id: String,
}

/// `NewConversation` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationPayload {
    pub conversation: Conversation,
}

/// `CampaignProgress` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgressPayload {
    pub campaign_id: String,
    #[serde(default, deserialize_with = "deserialize_u64_from_number")]
    pub sent: u64,
    #[serde(default, deserialize_with = "deserialize_u64_from_number")]
    pub delivered: u64,
    #[serde(default, deserialize_with = "deserialize_u64_from_number")]
    pub failed: u64,
    #[serde(default, deserialize_with = "deserialize_u64_from_number")]
    pub total: u64,
}

/// A schema-validated event. Serializes as `{"event": <kind>, "data": <payload>}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    NewNotification(NotificationPayload),
    NewMessage(NewMessagePayload),
    ChatAssignment(AssignmentPayload),
    ChatUnAssignment(AssignmentPayload),
    Error(ErrorPayload),
    ReloadRequired(ReloadRequiredPayload),
    ConversationClosed(ConversationClosedPayload),
    NewConversation(NewConversationPayload),
    CampaignProgress(CampaignProgressPayload),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewNotification(_) => EventKind::NewNotification,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::ChatAssignment(_) => EventKind::ChatAssignment,
            Self::ChatUnAssignment(_) => EventKind::ChatUnAssignment,
            Self::Error(_) => EventKind::Error,
            Self::ReloadRequired(_) => EventKind::ReloadRequired,
            Self::ConversationClosed(_) => EventKind::ConversationClosed,
            Self::NewConversation(_) => EventKind::NewConversation,
            Self::CampaignProgress(_) => EventKind::CampaignProgress,
        }
    }

    /// Conversation the event refers to, when it refers to one.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::NewMessage(p) => Some(&p.conversation_id),
            Self::ChatAssignment(p) | Self::ChatUnAssignment(p) => Some(&p.conversation_id),
            Self::ConversationClosed(p) => Some(&p.conversation_id),
            Self::NewConversation(p) => Some(&p.conversation.id),
            Self::NewNotification(_) | Self::Error(_) | Self::ReloadRequired(_) | Self::CampaignProgress(_) => None,
        }
    }
}

/// A validated event plus the envelope's scoping metadata.
///
/// `user_id` and `organization_id` are carried for consumers; the channel
/// does not filter on them.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(flatten)]
    pub event: Event,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
}

//! Inbox records carried inside event payloads.
//!
//! DESIGN
//! ======
//! These types mirror the backend's conversation/message JSON (camelCase keys)
//! so payload validation is plain serde deserialization. Optional fields
//! default when absent; identifier fields are checked for emptiness by the
//! frame parser, not here.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// A single chat message inside a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable message identifier assigned by the backend.
    pub unique_id: String,
    /// Text body, absent for media-only messages.
    #[serde(default)]
    pub text: Option<String>,
    /// Content type reported by the WhatsApp gateway (e.g. `"text"`, `"image"`).
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub direction: MessageDirection,
    /// Delivery status (e.g. `"sent"`, `"delivered"`, `"read"`).
    #[serde(default)]
    pub status: Option<String>,
    /// ISO 8601 creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Whether a message came from the contact or was sent by the organization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    #[default]
    Inbound,
    Outbound,
}

/// The WhatsApp contact on the other side of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// E.164 phone number.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Lifecycle status of a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Open,
    Closed,
}

/// A conversation record as held by the inbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Stable conversation identifier.
    pub id: String,
    #[serde(default)]
    pub contact: Option<Contact>,
    /// Messages in arrival order.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "deserialize_u32_from_number")]
    pub unread_count: u32,
    /// Team member the conversation is assigned to, if any.
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: ConversationStatus,
}

impl Conversation {
    /// Build an empty open conversation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contact: None,
            messages: Vec::new(),
            unread_count: 0,
            assigned_to: None,
            status: ConversationStatus::Open,
        }
    }
}

pub(crate) fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_u64_from_number(deserializer)?;
    u32::try_from(value).map_err(|_| D::Error::custom(format!("value {value} out of range for u32")))
}

pub(crate) fn deserialize_u64_from_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_u64() {
                return Ok(int);
            }
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            if let Some(float) = number.as_f64()
                && float.is_finite()
                && float.fract() == 0.0
                && float >= 0.0
                && float <= u64::MAX as f64
            {
                return Ok(float as u64);
            }
            Err(D::Error::custom("expected non-negative integer"))
        }
        _ => Err(D::Error::custom("expected number")),
    }
}

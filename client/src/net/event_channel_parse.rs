//! Frame decoding and schema validation for `event_channel`.
//!
//! Pipeline: SSE event name -> [`EventKind`], body -> base64 -> protobuf
//! [`frames::Envelope`] -> kind-specific payload schema -> [`InboundEvent`].
//! Nothing here touches state; a frame either validates completely or is
//! rejected with a [`FrameError`].

#[cfg(test)]
#[path = "event_channel_parse_test.rs"]
mod event_channel_parse_test;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::net::events::{
    AssignmentPayload, CampaignProgressPayload, ConversationClosedPayload, ErrorPayload, Event, EventKind,
    InboundEvent, NewConversationPayload, NewMessagePayload, NotificationPayload, ReloadRequiredPayload,
};
use crate::net::sse::SseEvent;

/// Why a frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("frame body could not be decoded: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("frame named `{frame}` carries envelope for `{envelope}`")]
    KindMismatch { frame: EventKind, envelope: String },
    #[error("{kind} payload failed schema validation: {source}")]
    Schema {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} payload has empty `{field}`")]
    EmptyField { kind: EventKind, field: &'static str },
    #[error("{kind} payload `{field}` is not an object")]
    NotAnObject { kind: EventKind, field: &'static str },
}

/// Decode and validate one SSE frame.
///
/// # Errors
///
/// Returns [`FrameError`] for unknown kinds, undecodable bodies, mismatched
/// envelopes, and payloads that fail their kind's schema.
pub fn parse_frame(frame: &SseEvent) -> Result<InboundEvent, FrameError> {
    let name = frame.event.as_deref().unwrap_or("message");
    let kind = EventKind::from_wire(name).ok_or_else(|| FrameError::UnknownKind(name.to_owned()))?;

    let envelope = frames::decode_body(&frame.data)?;
    if !envelope.event.is_empty() && envelope.event != kind.as_wire() {
        return Err(FrameError::KindMismatch { frame: kind, envelope: envelope.event });
    }

    let event = validate_payload(kind, envelope.data)?;
    Ok(InboundEvent { event, user_id: envelope.user_id, organization_id: envelope.organization_id })
}

/// Validate `data` against the schema registered for `kind`.
///
/// A `null` payload is treated as an empty object, so kinds whose fields are
/// all optional accept it while required fields still fail.
///
/// # Errors
///
/// Returns [`FrameError::NotAnObject`] for non-object payloads or nested
/// records, [`FrameError::Schema`], or [`FrameError::EmptyField`].
pub fn validate_payload(kind: EventKind, data: Value) -> Result<Event, FrameError> {
    let data = if data.is_null() { Value::Object(serde_json::Map::new()) } else { data };
    // Derived structs also deserialize from sequences; every schema here is an object.
    if !data.is_object() {
        return Err(FrameError::NotAnObject { kind, field: "data" });
    }
    require_objects(kind, &data)?;

    let event = match kind {
        EventKind::NewNotification => Event::NewNotification(schema::<NotificationPayload>(kind, data)?),
        EventKind::NewMessage => {
            let payload = schema::<NewMessagePayload>(kind, data)?;
            require(kind, "conversationId", &payload.conversation_id)?;
            require(kind, "message.uniqueId", &payload.message.unique_id)?;
            Event::NewMessage(payload)
        }
        EventKind::ChatAssignment => {
            let payload = schema::<AssignmentPayload>(kind, data)?;
            require(kind, "conversationId", &payload.conversation_id)?;
            Event::ChatAssignment(payload)
        }
        EventKind::ChatUnAssignment => {
            let payload = schema::<AssignmentPayload>(kind, data)?;
            require(kind, "conversationId", &payload.conversation_id)?;
            Event::ChatUnAssignment(payload)
        }
        EventKind::Error => Event::Error(schema::<ErrorPayload>(kind, data)?),
        EventKind::ReloadRequired => Event::ReloadRequired(schema::<ReloadRequiredPayload>(kind, data)?),
        EventKind::ConversationClosed => {
            let payload = schema::<ConversationClosedPayload>(kind, data)?;
            require(kind, "conversationId", &payload.conversation_id)?;
            Event::ConversationClosed(payload)
        }
        EventKind::NewConversation => {
            let payload = schema::<NewConversationPayload>(kind, data)?;
            require(kind, "conversation.id", &payload.conversation.id)?;
            for message in &payload.conversation.messages {
                require(kind, "conversation.messages.uniqueId", &message.unique_id)?;
            }
            Event::NewConversation(payload)
        }
        EventKind::CampaignProgress => {
            let payload = schema::<CampaignProgressPayload>(kind, data)?;
            require(kind, "campaignId", &payload.campaign_id)?;
            Event::CampaignProgress(payload)
        }
    };
    Ok(event)
}

fn schema<T: DeserializeOwned>(kind: EventKind, data: Value) -> Result<T, FrameError> {
    serde_json::from_value(data).map_err(|source| FrameError::Schema { kind, source })
}

/// Object-typed fields nested in a payload, as `(JSON pointer, field name)`.
const NESTED_OBJECTS: [(EventKind, &str, &'static str); 3] = [
    (EventKind::NewMessage, "/message", "message"),
    (EventKind::NewConversation, "/conversation", "conversation"),
    (EventKind::NewConversation, "/conversation/contact", "conversation.contact"),
];

fn require_objects(kind: EventKind, data: &Value) -> Result<(), FrameError> {
    for &(owner, pointer, field) in &NESTED_OBJECTS {
        if owner != kind {
            continue;
        }
        if let Some(value) = data.pointer(pointer) {
            if !value.is_null() && !value.is_object() {
                return Err(FrameError::NotAnObject { kind, field });
            }
        }
    }
    if kind == EventKind::NewConversation {
        if let Some(Value::Array(messages)) = data.pointer("/conversation/messages") {
            if messages.iter().any(|m| !m.is_object()) {
                return Err(FrameError::NotAnObject { kind, field: "conversation.messages" });
            }
        }
    }
    Ok(())
}

fn require(kind: EventKind, field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.trim().is_empty() {
        return Err(FrameError::EmptyField { kind, field });
    }
    Ok(())
}

//! Event envelope model and binary codec for the inbox event stream.
//!
//! This crate owns the wire representation pushed by the backend's event
//! stream. Every SSE frame body is base64 text wrapping a protobuf-encoded
//! [`Envelope`]. Payload data stays flexible (`serde_json::Value`) here;
//! kind-specific schema validation happens in the consuming client.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Largest magnitude an `f64` can hold while still representing every integer exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Error returned by [`decode_envelope`] and [`decode_body`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame body is not valid base64 text.
    #[error("invalid base64 frame body: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The raw bytes could not be decoded as a protobuf `WireEnvelope`.
    #[error("failed to decode protobuf envelope: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// A single event pushed by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Event kind name, e.g. `"NewMessage"`.
    pub event: String,
    /// Kind-specific payload.
    pub data: Value,
    /// Acting user, if the server attributed one.
    pub user_id: Option<String>,
    /// Organization scope, if any.
    pub organization_id: Option<String>,
}

impl Envelope {
    /// Build an envelope with no user/organization attribution.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data, user_id: None, organization_id: None }
    }
}

/// Encode an envelope into protobuf bytes.
#[must_use]
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    let wire = envelope_to_wire(envelope);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let wire = WireEnvelope::decode(bytes)?;
    Ok(wire_to_envelope(wire))
}

/// Encode an envelope as an SSE frame body (base64 of the protobuf bytes).
#[must_use]
pub fn encode_body(envelope: &Envelope) -> String {
    STANDARD.encode(encode_envelope(envelope))
}

/// Decode an SSE frame body into an envelope. ASCII whitespace anywhere in
/// the body is ignored.
///
/// # Errors
///
/// Returns [`CodecError::Base64`] when the body is not base64 and
/// [`CodecError::Decode`] when the decoded bytes are not a valid envelope.
pub fn decode_body(body: &str) -> Result<Envelope, CodecError> {
    // Multi-line `data:` fields arrive joined with `\n`.
    let compact: String = body.split_ascii_whitespace().collect();
    let bytes = STANDARD.decode(compact)?;
    decode_envelope(&bytes)
}

fn envelope_to_wire(envelope: &Envelope) -> WireEnvelope {
    WireEnvelope {
        event: envelope.event.clone(),
        data: Some(json_to_proto_value(&envelope.data)),
        user_id: envelope.user_id.clone(),
        organization_id: envelope.organization_id.clone(),
    }
}

fn wire_to_envelope(wire: WireEnvelope) -> Envelope {
    Envelope {
        event: wire.event,
        data: wire.data.map_or(Value::Null, |v| proto_to_json_value(&v)),
        user_id: wire.user_id,
        organization_id: wire.organization_id,
    }
}

/// JSON payload to `google.protobuf.Value`.
fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => {
            prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32)
        }
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

/// `google.protobuf.Value` back to JSON; a missing kind reads as `null`.
fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => number_to_json(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect::<Map<_, _>>(),
        ),
        prost_types::value::Kind::ListValue(v) => {
            Value::Array(v.values.iter().map(proto_to_json_value).collect())
        }
    }
}

/// Protobuf carries every number as `f64`; integral values come back as JSON
/// integers so integer-typed payload fields still deserialize.
#[allow(clippy::cast_possible_truncation)]
fn number_to_json(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireEnvelope {
    #[prost(string, tag = "1")]
    event: String,
    #[prost(message, optional, tag = "2")]
    data: Option<prost_types::Value>,
    #[prost(string, optional, tag = "3")]
    user_id: Option<String>,
    #[prost(string, optional, tag = "4")]
    organization_id: Option<String>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

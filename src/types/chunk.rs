//! Provider-native chunk envelope.

use serde_json::Value;

/// One incremental unit from a provider's streaming response.
///
/// The payload is kept loosely typed: the classifier probes its shape, and
/// each decoder reinterprets it through that vendor's own schema. Responses
/// API transports carry the event name out-of-band rather than in the body.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub payload: Value,
    /// Event-type string for event-framed protocols (`response.*`).
    pub event: Option<String>,
}

impl RawChunk {
    /// A chunk holding a provider JSON payload.
    pub fn json(payload: Value) -> Self {
        Self {
            payload,
            event: None,
        }
    }

    /// A plain text chunk (text-only generators, raw fallback).
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Value::String(text.into()),
            event: None,
        }
    }

    /// An event-framed chunk (Responses API).
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            payload,
            event: Some(event.into()),
        }
    }

    /// A paired chunk: the vendor's accumulated response so far plus the
    /// incremental inner chunk (xAI SDK `chat.stream` convention).
    pub fn pair(response_so_far: Value, inner: Value) -> Self {
        Self {
            payload: Value::Array(vec![response_so_far, inner]),
            event: None,
        }
    }
}

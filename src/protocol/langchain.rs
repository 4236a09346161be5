//! LangChain chat-message streaming decoder.

use serde_json::Value;

use crate::types::RawChunk;

/// LangChain message chunks expose a `content` field that is usually a
/// string but may be a structured block list; either way the delta is its
/// stringified form.
pub(super) fn decode(chunk: &RawChunk) -> Option<String> {
    match chunk.payload.get("content")? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

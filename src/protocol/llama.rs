//! LlamaIndex chat streaming decoder.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::run::state::RunState;
use crate::types::{RawChunk, ToolCall};

#[derive(Debug, Default, Deserialize)]
struct LlamaChunk {
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<LlamaMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct LlamaMessage {
    #[serde(default)]
    additional_kwargs: LlamaKwargs,
}

#[derive(Debug, Default, Deserialize)]
struct LlamaKwargs {
    #[serde(default)]
    tool_calls: Vec<Value>,
}

/// LlamaIndex reports the *complete* current tool call on every chunk rather
/// than incremental fragments, so the newest snapshot replaces the whole
/// table instead of appending to it.
pub(super) fn decode(state: &mut RunState, chunk: &RawChunk) -> Option<String> {
    let parsed: LlamaChunk = serde_json::from_value(chunk.payload.clone()).ok()?;

    if let Some(snapshot) = parsed
        .message
        .as_ref()
        .and_then(|m| m.additional_kwargs.tool_calls.last())
    {
        if let Some(call) = snapshot_to_call(snapshot) {
            state.calls.replace_with(call);
        }
    }

    parsed.delta.filter(|text| !text.is_empty())
}

fn snapshot_to_call(snapshot: &Value) -> Option<ToolCall> {
    let function = snapshot.get("function");
    let name = function
        .and_then(|f| f.get("name"))
        .or_else(|| snapshot.get("name"))
        .and_then(|n| n.as_str())?;
    let arguments = function
        .and_then(|f| f.get("arguments"))
        .or_else(|| snapshot.get("arguments"))
        .map(|a| match a {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let id = snapshot
        .get("id")
        .and_then(|i| i.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Some(ToolCall::new(id, name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delta_field_is_the_text() {
        let mut state = RunState::new();
        let chunk = RawChunk::json(json!({"delta": "partial"}));
        assert_eq!(decode(&mut state, &chunk), Some("partial".to_string()));
    }

    #[test]
    fn successive_snapshots_leave_one_entry() {
        let mut state = RunState::new();
        let first = RawChunk::json(json!({
            "delta": "",
            "message": {"additional_kwargs": {"tool_calls": [
                {"id": "c1", "function": {"name": "lookup", "arguments": "{\"q\":"}}
            ]}}
        }));
        let second = RawChunk::json(json!({
            "delta": "",
            "message": {"additional_kwargs": {"tool_calls": [
                {"id": "c1", "function": {"name": "lookup", "arguments": "{\"q\":1}"}}
            ]}}
        }));
        decode(&mut state, &first);
        decode(&mut state, &second);
        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.calls.entries()[0].function.arguments, "{\"q\":1}");
    }

    #[test]
    fn structured_arguments_are_serialized() {
        let call = snapshot_to_call(&json!({
            "id": "c2",
            "function": {"name": "add", "arguments": {"a": 1}}
        }))
        .unwrap();
        assert_eq!(call.function.arguments, "{\"a\":1}");
    }
}

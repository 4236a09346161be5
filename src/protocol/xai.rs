//! xAI SDK streaming decoder.
//!
//! The SDK's `chat.stream` yields `(accumulated-response, chunk)` pairs.
//! Citations, usage and tool calls are only reliable on the terminal
//! accumulated response, so the latest one is remembered and re-examined
//! after the loop ends.

use serde_json::Value;
use uuid::Uuid;

use super::{usage, Protocol};
use crate::run::state::RunState;
use crate::types::{RawChunk, ToolCall, TurnResult};

pub(super) fn decode(state: &mut RunState, chunk: &RawChunk) -> Option<String> {
    let pair = chunk.payload.as_array()?;
    let (response_so_far, inner) = (pair.first()?, pair.get(1)?);

    state.last_response = Some(response_so_far.clone());

    match inner {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        other => other
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_string),
    }
}

/// Terminal fallback over the last accumulated response. Tool calls are taken
/// only when incremental extraction yielded nothing; citations merge into the
/// deduplicated sets; usage fills in only if still empty.
pub(crate) fn absorb_final_response(state: &mut RunState, turn: &mut TurnResult, response: &Value) {
    if state.calls.is_empty() {
        if let Some(calls) = response.get("tool_calls").and_then(|t| t.as_array()) {
            for call in calls {
                if let Some(converted) = convert_tool_call(call) {
                    state.calls.push_unique(converted);
                }
            }
        }
    }

    if let Some(citations) = response.get("citations").and_then(|c| c.as_array()) {
        for url in citations.iter().filter_map(|u| u.as_str()) {
            state.push_citation(url);
            turn.push_url(url);
        }
    }

    if state.usage.is_empty() {
        if let Some(captured) = response
            .get("usage")
            .and_then(|u| usage::extract(Protocol::XaiSdk, u))
        {
            state.record_usage(Protocol::XaiSdk, &captured);
        }
    }
}

fn convert_tool_call(call: &Value) -> Option<ToolCall> {
    let function = call.get("function");
    let name = function
        .and_then(|f| f.get("name"))
        .or_else(|| call.get("name"))
        .and_then(|n| n.as_str())?;
    let arguments = function
        .and_then(|f| f.get("arguments"))
        .or_else(|| call.get("arguments"))
        .map(|a| match a {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let id = call
        .get("id")
        .and_then(|i| i.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Some(ToolCall::new(id, name, arguments))
}

//! Anthropic Messages streaming decoder.
//!
//! Handles two shapes of the same semantic payload: full envelope events
//! (`message_start`, `content_block_*`, `message_delta`, ...) and bare delta
//! objects (`text_delta`, `input_json_delta`, ...) that can arrive without an
//! envelope. Dispatch is keyed on the chunk's own `type` tag, not on nesting
//! depth.

use serde::Deserialize;
use serde_json::Value;

use super::{usage, Protocol};
use crate::run::state::{RunState, RECENT_CALL_KEY};
use crate::types::{RawChunk, ToolCall};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    MessageStart {
        #[serde(default)]
        message: Option<MessageInfo>,
    },
    ContentBlockStart {
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        content_block: Option<ContentBlock>,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: Option<usize>,
        delta: DeltaPayload,
    },
    ContentBlockStop {
        #[serde(default)]
        index: Option<usize>,
    },
    MessageDelta {
        #[serde(default)]
        delta: Option<StopInfo>,
        #[serde(default)]
        usage: Option<Value>,
    },
    MessageStop,
    Ping,
    Error {
        #[serde(default)]
        error: Value,
    },
    // Bare deltas arriving without an enclosing envelope.
    TextDelta {
        #[serde(default)]
        text: String,
    },
    InputJsonDelta {
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        partial_json: String,
    },
    ThinkingDelta {
        #[serde(default)]
        thinking: String,
    },
    SignatureDelta {
        #[serde(default)]
        signature: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct MessageInfo {
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaPayload {
    TextDelta {
        #[serde(default)]
        text: String,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    ThinkingDelta {
        #[serde(default)]
        thinking: String,
    },
    SignatureDelta {
        #[serde(default)]
        signature: String,
    },
    #[serde(other)]
    Other,
}

pub(super) fn decode(state: &mut RunState, chunk: &RawChunk) -> Option<String> {
    let event: AnthropicEvent = serde_json::from_value(chunk.payload.clone()).ok()?;

    match event {
        AnthropicEvent::MessageStart { message } => {
            if let Some(captured) = message
                .and_then(|m| m.usage)
                .as_ref()
                .and_then(|u| usage::extract(Protocol::Anthropic, u))
            {
                state.record_usage(Protocol::Anthropic, &captured);
            }
            None
        }
        AnthropicEvent::ContentBlockStart {
            index,
            content_block: Some(ContentBlock::ToolUse { id, name }),
        } => {
            open_tool_block(state, index, id, name);
            None
        }
        AnthropicEvent::ContentBlockStart { .. } => None,
        AnthropicEvent::ContentBlockDelta { index, delta } => match delta {
            DeltaPayload::TextDelta { text } => non_empty(text),
            DeltaPayload::InputJsonDelta { partial_json } => {
                append_argument_json(state, index, &partial_json);
                None
            }
            // Internal reasoning must not leak into the visible output.
            DeltaPayload::ThinkingDelta { .. }
            | DeltaPayload::SignatureDelta { .. }
            | DeltaPayload::Other => None,
        },
        AnthropicEvent::ContentBlockStop { index } => {
            close_tool_block(state, index);
            None
        }
        AnthropicEvent::MessageDelta { delta, usage } => {
            if let Some(captured) = usage
                .as_ref()
                .and_then(|u| usage::extract(Protocol::Anthropic, u))
            {
                state.record_usage(Protocol::Anthropic, &captured);
            }
            if delta.and_then(|d| d.stop_reason).as_deref() == Some("tool_use") {
                state.force_function_call = true;
            }
            None
        }
        AnthropicEvent::TextDelta { text } => non_empty(text),
        AnthropicEvent::InputJsonDelta {
            index,
            partial_json,
        } => {
            append_argument_json(state, index, &partial_json);
            None
        }
        AnthropicEvent::ThinkingDelta { .. } | AnthropicEvent::SignatureDelta { .. } => None,
        // Transport-level errors are surfaced by the orchestrator, not here.
        AnthropicEvent::MessageStop
        | AnthropicEvent::Ping
        | AnthropicEvent::Error { .. }
        | AnthropicEvent::Unknown => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct StopInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Open a tool-call entry and its argument buffer for a `tool_use` block.
/// The buffer is mirrored into the most-recent sentinel slot so bare
/// `input_json_delta` events with no envelope still land in the right place.
fn open_tool_block(state: &mut RunState, index: Option<usize>, id: String, name: String) {
    let block_key = index.unwrap_or(state.calls.len()).to_string();
    state
        .calls
        .open_call(ToolCall::new(id, name, ""), &[block_key.as_str()]);
    state.argument_buffers.insert(block_key, String::new());
    state
        .argument_buffers
        .insert(RECENT_CALL_KEY.to_string(), String::new());
}

/// Route an argument-JSON fragment into the indexed buffer (mirroring the
/// most-recent sentinel) and keep the last entry's arguments observable
/// before the block closes.
fn append_argument_json(state: &mut RunState, index: Option<usize>, fragment: &str) {
    let key = match index {
        Some(index) => index.to_string(),
        None => RECENT_CALL_KEY.to_string(),
    };
    state.append_argument(&key, fragment);
    if key != RECENT_CALL_KEY {
        state.append_argument(RECENT_CALL_KEY, fragment);
    }
    let accumulated = state
        .argument_buffers
        .get(&key)
        .cloned()
        .unwrap_or_default();
    if let Some(entry) = state.calls.last_mut() {
        entry.function.arguments = accumulated;
    }
}

/// Finalize the indexed buffer into the matching tool-call entry.
fn close_tool_block(state: &mut RunState, index: Option<usize>) {
    let Some(index) = index else { return };
    let key = index.to_string();
    if let Some(arguments) = state.take_argument_buffer(&key) {
        state.take_argument_buffer(RECENT_CALL_KEY);
        if let Some(entry) = state.calls.get_by_key(&key) {
            entry.function.arguments = arguments;
        }
    }
}

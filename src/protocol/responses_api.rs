//! OpenAI Responses API streaming decoder.
//!
//! Responses streams are event-framed: the transport layer hands us the
//! event-type string out-of-band (or embedded as `type` in the body), and
//! each event kind gets its own case here.

use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, warn};

use super::{usage, DecodeCtx, Protocol};
use crate::run::state::RunState;
use crate::types::{ContainerFileRef, RawChunk};

pub(super) fn decode(
    ctx: &mut DecodeCtx<'_>,
    state: &mut RunState,
    chunk: &RawChunk,
) -> Option<String> {
    let event = chunk
        .event
        .as_deref()
        .or_else(|| chunk.payload.get("type").and_then(|t| t.as_str()))?;
    let payload = &chunk.payload;

    match event {
        "response.created" => {
            ctx.turn.message_id = payload
                .get("response")
                .and_then(|r| r.get("id"))
                .and_then(|id| id.as_str())
                .map(str::to_string);
            None
        }
        "response.completed" => {
            on_completed(ctx, state, payload.get("response"));
            None
        }
        "response.output_text.delta" | "response.reasoning_summary_text.delta" => payload
            .get("delta")
            .and_then(|d| d.as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        "response.output_item.added" => {
            if let Some(item) = payload.get("item") {
                open_function_call_item(state, item);
            }
            None
        }
        "response.function_call_arguments.delta" => {
            if let (Some(key), Some(fragment)) = (
                item_key(payload),
                payload.get("delta").and_then(|d| d.as_str()),
            ) {
                state.append_argument(&key, fragment);
            }
            None
        }
        "response.function_call_arguments.done" => {
            if let Some(key) = item_key(payload) {
                let arguments = state
                    .take_argument_buffer(&key)
                    .filter(|buffer| !buffer.is_empty())
                    .or_else(|| {
                        payload
                            .get("arguments")
                            .and_then(|a| a.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                if let Some(entry) = state.calls.get_by_key(&key) {
                    entry.function.arguments = arguments;
                }
            }
            None
        }
        "response.output_text.annotation.added" => {
            if let Some(annotation) = payload.get("annotation") {
                on_annotation(ctx, state, annotation);
            }
            None
        }
        "response.output_item.done" => {
            if let (Some(hook), Some(item)) = (ctx.item_hook, payload.get("item")) {
                hook.on_item_done(item, state);
            }
            None
        }
        "response.code_interpreter_call_code.delta" => {
            let fragment = payload.get("delta").and_then(|d| d.as_str())?;
            if state.code_fence_open {
                Some(fragment.to_string())
            } else {
                state.code_fence_open = true;
                Some(format!("```python\n{fragment}"))
            }
        }
        "response.code_interpreter_call_code.done" => {
            if state.code_fence_open {
                state.code_fence_open = false;
                Some("\n```\n".to_string())
            } else {
                None
            }
        }
        "response.image_generation_call.partial_image" => {
            if let Some(encoded) = payload.get("partial_image_b64").and_then(|b| b.as_str()) {
                write_partial_image(ctx, state, encoded);
            }
            None
        }
        // Structural events: nothing visible, transport errors are the
        // orchestrator's concern.
        "response.in_progress" | "response.done" | "response.failed" | "error" => None,
        other => {
            debug!(event = other, "ignoring unhandled response event");
            None
        }
    }
}

/// The id the arguments stream is keyed by: `item_id` on delta/done events,
/// `call_id` on some transports.
fn item_key(payload: &Value) -> Option<String> {
    payload
        .get("item_id")
        .or_else(|| payload.get("call_id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

fn open_function_call_item(state: &mut RunState, item: &Value) {
    if item.get("type").and_then(|t| t.as_str()) != Some("function_call") {
        return;
    }
    let id = item
        .get("id")
        .or_else(|| item.get("call_id"))
        .and_then(|id| id.as_str())
        .unwrap_or_default()
        .to_string();
    let name = item
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or_default()
        .to_string();
    let call_id = item
        .get("call_id")
        .and_then(|id| id.as_str())
        .unwrap_or(&id)
        .to_string();
    state.calls.open_call(
        crate::types::ToolCall::new(id.clone(), name, ""),
        &[id.as_str(), call_id.as_str()],
    );
    state.argument_buffers.entry(id).or_default();
}

fn on_completed(ctx: &mut DecodeCtx<'_>, state: &mut RunState, response: Option<&Value>) {
    let Some(response) = response else { return };

    if let Some(captured) = response
        .get("usage")
        .and_then(|u| usage::extract(Protocol::ResponsesApi, u))
    {
        state.record_usage(Protocol::ResponsesApi, &captured);
    }

    let Some(output) = response.get("output").and_then(|o| o.as_array()) else {
        return;
    };
    for item in output {
        match item.get("type").and_then(|t| t.as_str()) {
            Some("mcp_list_tools") => {
                ctx.turn
                    .extra
                    .insert("available_tools".to_string(), item.clone());
            }
            Some("mcp_approval_request") => {
                ctx.turn
                    .extra
                    .insert("pending_tool_approval".to_string(), item.clone());
                // A caller may be polling the store for this record.
                state.pending_upsert = true;
            }
            _ => {}
        }
    }
}

fn on_annotation(ctx: &mut DecodeCtx<'_>, state: &mut RunState, annotation: &Value) {
    match annotation.get("type").and_then(|t| t.as_str()) {
        Some("url_citation") => {
            if let Some(url) = annotation.get("url").and_then(|u| u.as_str()) {
                state.push_citation(url);
                ctx.turn.push_url(url);
            }
        }
        Some("container_file_citation") => {
            let container_id = annotation
                .get("container_id")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            let file_id = annotation
                .get("file_id")
                .and_then(|f| f.as_str())
                .unwrap_or_default()
                .to_string();
            if !file_id.is_empty() {
                state.container_files.push(ContainerFileRef {
                    container_id,
                    file_id,
                });
            }
        }
        _ => {}
    }
}

/// One bad image must not abort the stream: decode/write failures are logged
/// and swallowed.
fn write_partial_image(ctx: &mut DecodeCtx<'_>, state: &mut RunState, encoded: &str) {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "dropping undecodable partial image");
            return;
        }
    };
    match ctx
        .images
        .reserve_path(ctx.turn)
        .and_then(|path| ctx.images.write(&path, &bytes).map(|()| path))
    {
        Ok(path) => {
            state.image_paths.push(path);
            state.produced_image = true;
        }
        Err(e) => warn!(error = %e, "failed to store partial image"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::DiscardImages;
    use crate::types::TurnResult;
    use serde_json::json;

    fn feed(
        state: &mut RunState,
        turn: &mut TurnResult,
        events: Vec<(&str, Value)>,
    ) -> String {
        let mut out = String::new();
        for (event, payload) in events {
            let mut ctx = DecodeCtx {
                turn: &mut *turn,
                images: &DiscardImages,
                item_hook: None,
            };
            if let Some(delta) = decode(&mut ctx, state, &RawChunk::event(event, payload)) {
                out.push_str(&delta);
            }
        }
        out
    }

    #[test]
    fn argument_fragments_assemble_by_item_id() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        feed(
            &mut state,
            &mut turn,
            vec![
                (
                    "response.output_item.added",
                    json!({"item": {"type": "function_call", "id": "x", "name": "add"}}),
                ),
                (
                    "response.function_call_arguments.delta",
                    json!({"item_id": "x", "delta": "{\"a\":"}),
                ),
                (
                    "response.function_call_arguments.delta",
                    json!({"item_id": "x", "delta": "1}"}),
                ),
                ("response.function_call_arguments.done", json!({"item_id": "x"})),
            ],
        );
        assert_eq!(state.calls.entries()[0].function.arguments, "{\"a\":1}");
        assert!(state.argument_buffers.is_empty());
    }

    #[test]
    fn reasoning_summary_is_ordinary_text() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        let out = feed(
            &mut state,
            &mut turn,
            vec![
                ("response.output_text.delta", json!({"delta": "a"})),
                ("response.reasoning_summary_text.delta", json!({"delta": "b"})),
            ],
        );
        assert_eq!(out, "ab");
    }

    #[test]
    fn code_interpreter_deltas_are_fenced() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        let out = feed(
            &mut state,
            &mut turn,
            vec![
                ("response.code_interpreter_call_code.delta", json!({"delta": "x = 1"})),
                ("response.code_interpreter_call_code.delta", json!({"delta": "\ny = 2"})),
                ("response.code_interpreter_call_code.done", json!({})),
            ],
        );
        assert_eq!(out, "```python\nx = 1\ny = 2\n```\n");
        assert!(!state.code_fence_open);
    }

    #[test]
    fn annotations_route_to_urls_and_container_files() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        feed(
            &mut state,
            &mut turn,
            vec![
                (
                    "response.output_text.annotation.added",
                    json!({"annotation": {"type": "url_citation", "url": "https://cited.example"}}),
                ),
                (
                    "response.output_text.annotation.added",
                    json!({"annotation": {"type": "container_file_citation",
                           "container_id": "cntr_1", "file_id": "file_1"}}),
                ),
            ],
        );
        assert_eq!(turn.urls, vec!["https://cited.example"]);
        assert_eq!(
            state.container_files,
            vec![ContainerFileRef {
                container_id: "cntr_1".to_string(),
                file_id: "file_1".to_string()
            }]
        );
    }

    #[test]
    fn created_correlates_message_id_and_completed_captures_usage() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        feed(
            &mut state,
            &mut turn,
            vec![
                ("response.created", json!({"response": {"id": "resp_1"}})),
                (
                    "response.completed",
                    json!({"response": {
                        "usage": {"input_tokens": 5, "output_tokens": 9, "total_tokens": 14},
                        "output": [
                            {"type": "mcp_approval_request", "id": "appr_1"},
                        ],
                    }}),
                ),
            ],
        );
        assert_eq!(turn.message_id.as_deref(), Some("resp_1"));
        assert_eq!(state.usage.input_tokens, Some(5));
        assert!(turn.extra.contains_key("pending_tool_approval"));
        assert!(state.pending_upsert);
    }

    #[test]
    fn partial_image_is_stored_not_emitted() {
        let mut state = RunState::new();
        let mut turn = TurnResult::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"not-a-real-png");
        let out = feed(
            &mut state,
            &mut turn,
            vec![(
                "response.image_generation_call.partial_image",
                json!({"partial_image_b64": encoded}),
            )],
        );
        assert_eq!(out, "");
        assert!(state.produced_image);
        assert_eq!(state.image_paths.len(), 1);
    }
}

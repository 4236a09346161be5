//! Protocol detection and per-vendor chunk decoding.

pub mod anthropic;
pub mod chat_completions;
pub mod completions;
pub mod google;
pub mod langchain;
pub mod llama;
pub mod responses_api;
pub mod usage;
pub mod xai;

use serde_json::Value;
use strum::{Display, EnumString};

use crate::hooks::{ImageStore, ItemHook};
use crate::run::state::RunState;
use crate::types::{RawChunk, TurnResult};

/// Streaming protocols this normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Protocol {
    ChatCompletions,
    ResponsesApi,
    Completions,
    LangChain,
    Llama,
    Google,
    Anthropic,
    XaiSdk,
    Raw,
}

/// Anthropic SSE event-name literals, including the bare delta objects that
/// can arrive without an enclosing envelope.
const ANTHROPIC_EVENTS: &[&str] = &[
    "message_start",
    "message_delta",
    "message_stop",
    "content_block_start",
    "content_block_delta",
    "content_block_stop",
    "text_delta",
    "input_json_delta",
    "thinking_delta",
    "signature_delta",
    "ping",
];

/// Probe a chunk's shape and pick its protocol.
///
/// Order matters: several vendors share structurally similar fields, so
/// vendor-specific shapes are matched before generic fallbacks. A chunk
/// carrying both `choices[0].delta` and `candidates` is ChatCompletions, and
/// a `delta` field alone is only LlamaIndex when neither `type` nor
/// `candidates` is present.
pub fn classify(payload: &Value) -> Protocol {
    if let Some(choice) = payload.get("choices").and_then(|c| c.get(0)) {
        if choice.get("delta").is_some() {
            return Protocol::ChatCompletions;
        }
        if choice.get("text").is_some() {
            return Protocol::Completions;
        }
    }

    if let Some(items) = payload.as_array() {
        // (accumulated-response, chunk) pairs from the xAI SDK's chat.stream
        if items.len() == 2 {
            return Protocol::XaiSdk;
        }
    }

    if let Some(tag) = payload.get("type").and_then(|t| t.as_str()) {
        if ANTHROPIC_EVENTS.contains(&tag)
            || tag.starts_with("message_")
            || tag.starts_with("content_block_")
        {
            return Protocol::Anthropic;
        }
    }

    if payload.get("candidates").is_some() {
        return Protocol::Google;
    }

    if payload.get("content").is_some_and(|c| !c.is_null()) {
        return Protocol::LangChain;
    }

    if payload.get("delta").is_some()
        && payload.get("type").is_none()
        && payload.get("candidates").is_none()
    {
        return Protocol::Llama;
    }

    Protocol::Raw
}

/// Collaborators a decoder may touch while processing one chunk.
pub struct DecodeCtx<'a> {
    /// The turn being filled in; mid-run visible fields (`urls`, `images`,
    /// `message_id`) are written here before finalization.
    pub turn: &'a mut TurnResult,
    pub images: &'a dyn ImageStore,
    pub item_hook: Option<&'a dyn ItemHook>,
}

/// Decode one chunk with the decoder for `protocol`, returning the visible
/// text delta, if any. All other effects are mutations of `state` (and the
/// mid-run-visible fields of the turn).
pub fn decode(
    protocol: Protocol,
    ctx: &mut DecodeCtx<'_>,
    state: &mut RunState,
    chunk: &RawChunk,
) -> Option<String> {
    match protocol {
        Protocol::ChatCompletions => chat_completions::decode(ctx, state, chunk),
        Protocol::ResponsesApi => responses_api::decode(ctx, state, chunk),
        Protocol::Completions => completions::decode(chunk),
        Protocol::LangChain => langchain::decode(chunk),
        Protocol::Llama => llama::decode(state, chunk),
        Protocol::Google => google::decode(ctx, state, chunk),
        Protocol::Anthropic => anthropic::decode(state, chunk),
        Protocol::XaiSdk => xai::decode(state, chunk),
        Protocol::Raw => decode_raw(chunk),
    }
}

/// Fallback for unclassified or text-only generators.
fn decode_raw(chunk: &RawChunk) -> Option<String> {
    match &chunk.payload {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completions_wins_over_google_shape() {
        let payload = json!({
            "choices": [{"delta": {"content": "hi"}}],
            "candidates": [{}],
        });
        assert_eq!(classify(&payload), Protocol::ChatCompletions);
    }

    #[test]
    fn legacy_completions_text_shape() {
        let payload = json!({"choices": [{"text": "hi"}]});
        assert_eq!(classify(&payload), Protocol::Completions);
    }

    #[test]
    fn paired_tuple_is_xai() {
        let payload = json!([{"content": "so far"}, {"content": "delta"}]);
        assert_eq!(classify(&payload), Protocol::XaiSdk);
    }

    #[test]
    fn anthropic_event_names_and_prefixes() {
        assert_eq!(
            classify(&json!({"type": "content_block_delta", "delta": {}})),
            Protocol::Anthropic
        );
        assert_eq!(
            classify(&json!({"type": "input_json_delta", "partial_json": "{"})),
            Protocol::Anthropic
        );
        assert_eq!(
            classify(&json!({"type": "message_started_custom"})),
            Protocol::Anthropic
        );
    }

    #[test]
    fn delta_with_type_is_not_llama() {
        // Anthropic objects can expose `delta` too; the guard must hold.
        let payload = json!({"type": "oddball", "delta": "x"});
        assert_eq!(classify(&payload), Protocol::Raw);

        let payload = json!({"candidates": [], "delta": "x"});
        assert_eq!(classify(&payload), Protocol::Google);

        let payload = json!({"delta": "x"});
        assert_eq!(classify(&payload), Protocol::Llama);
    }

    #[test]
    fn langchain_content_shape() {
        assert_eq!(classify(&json!({"content": "hello"})), Protocol::LangChain);
        // null content falls through
        assert_eq!(classify(&json!({"content": null})), Protocol::Raw);
    }

    #[test]
    fn unclassified_is_raw() {
        assert_eq!(classify(&json!({"something": "else"})), Protocol::Raw);
        assert_eq!(classify(&json!("plain text")), Protocol::Raw);
    }

    #[test]
    fn raw_stringifies_non_null_payloads() {
        assert_eq!(decode_raw(&RawChunk::text("hi")), Some("hi".to_string()));
        assert_eq!(decode_raw(&RawChunk::json(Value::Null)), None);
        assert_eq!(
            decode_raw(&RawChunk::json(json!({"k": 1}))),
            Some("{\"k\":1}".to_string())
        );
    }

    #[test]
    fn protocol_names_round_trip() {
        use std::str::FromStr;
        assert_eq!(Protocol::ResponsesApi.to_string(), "responses_api");
        assert_eq!(Protocol::from_str("anthropic").unwrap(), Protocol::Anthropic);
    }
}

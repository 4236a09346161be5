//! OpenAI Chat Completions streaming decoder.

use serde::Deserialize;
use serde_json::Value;

use super::{usage, DecodeCtx, Protocol};
use crate::run::state::{append_fragment, RunState};
use crate::types::RawChunk;

/// One `chat.completion.chunk`, reduced to the fields this decoder reads.
#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    /// Some compatible vendors attach citation URLs at the top level.
    #[serde(default)]
    citations: Option<Vec<String>>,
    /// Final usage may ride on the last chunk of the stream.
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: Option<ChatDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

/// A streamed tool-call fragment; id/name/arguments arrive as concatenable
/// substrings spread over several chunks.
#[derive(Debug, Default, Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

pub(super) fn decode(
    ctx: &mut DecodeCtx<'_>,
    state: &mut RunState,
    chunk: &RawChunk,
) -> Option<String> {
    let parsed: ChatChunk = match serde_json::from_value(chunk.payload.clone()) {
        Ok(parsed) => parsed,
        Err(_) => return None,
    };

    if let Some(urls) = parsed.citations {
        for url in urls {
            state.push_citation(&url);
            ctx.turn.push_url(url);
        }
    }

    if let Some(captured) = parsed
        .usage
        .as_ref()
        .and_then(|u| usage::extract(Protocol::ChatCompletions, u))
    {
        state.record_usage(Protocol::ChatCompletions, &captured);
    }

    let delta = parsed.choices.into_iter().next()?.delta?;

    if let Some(fragments) = delta.tool_calls {
        for fragment in fragments {
            let position = fragment.index.unwrap_or_else(|| state.calls.len());
            let entry = state.calls.ensure_slot(position);
            if let Some(id) = fragment.id {
                append_fragment(&mut entry.id, &id);
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    append_fragment(&mut entry.function.name, &name);
                }
                if let Some(arguments) = function.arguments {
                    append_fragment(&mut entry.function.arguments, &arguments);
                }
            }
        }
    }

    delta.content.filter(|text| !text.is_empty())
}

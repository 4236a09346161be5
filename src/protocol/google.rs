//! Google Gemini streaming decoder.

use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::{usage, DecodeCtx, Protocol};
use crate::run::state::RunState;
use crate::types::{RawChunk, ToolCall};

// The REST API emits camelCase while SDK dumps emit snake_case; every field
// accepts both spellings.

#[derive(Debug, Default, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "functionCalls")]
    function_calls: Option<Vec<GeminiFunctionCall>>,
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, alias = "usageMetadata")]
    usage_metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, alias = "executableCode")]
    executable_code: Option<GeminiExecutableCode>,
    #[serde(default, alias = "inlineData")]
    inline_data: Option<GeminiBlob>,
    #[serde(default, alias = "fileData")]
    file_data: Option<GeminiFileData>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiExecutableCode {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiBlob {
    #[serde(default, alias = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiFileData {
    #[serde(default, alias = "mimeType")]
    mime_type: Option<String>,
    #[serde(default, alias = "fileUri")]
    file_uri: Option<String>,
}

pub(super) fn decode(
    ctx: &mut DecodeCtx<'_>,
    state: &mut RunState,
    chunk: &RawChunk,
) -> Option<String> {
    let parsed: GeminiChunk = match serde_json::from_value(chunk.payload.clone()) {
        Ok(parsed) => parsed,
        Err(_) => return None,
    };

    let mut out = String::new();

    if let Some(ref text) = parsed.text {
        out.push_str(text);
    }

    // Complete call objects, preferred over the per-part walk; Gemini may
    // repeat a call across chunks, so entries dedupe on (name, arguments).
    let mut recorded_call = false;
    if let Some(calls) = parsed.function_calls {
        for call in calls {
            record_function_call(state, call);
            recorded_call = true;
        }
    }

    for candidate in &parsed.candidates {
        let Some(ref content) = candidate.content else {
            continue;
        };
        for part in &content.parts {
            if parsed.text.is_none() {
                if let Some(ref text) = part.text {
                    out.push_str(text);
                }
            }
            if !recorded_call {
                if let Some(ref call) = part.function_call {
                    record_function_call(
                        state,
                        GeminiFunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        },
                    );
                }
            }
            if let Some(ref code) = part.executable_code {
                push_code_block(&mut out, code);
            }
            if let Some(ref blob) = part.inline_data {
                write_inline_image(ctx, state, blob);
            }
            if let Some(ref file) = part.file_data {
                if let Some(url) = remote_image_url(file) {
                    ctx.turn.push_url(url);
                }
            }
        }
    }

    if let Some(captured) = parsed
        .usage_metadata
        .as_ref()
        .and_then(|u| usage::extract(Protocol::Google, u))
    {
        state.record_usage(Protocol::Google, &captured);
    }

    harvest_citations(ctx, state, &chunk.payload);

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn record_function_call(state: &mut RunState, call: GeminiFunctionCall) {
    if call.name.is_empty() {
        return;
    }
    let arguments = call
        .args
        .map(|args| args.to_string())
        .unwrap_or_else(|| "{}".to_string());
    state.calls.push_unique(ToolCall::new(
        Uuid::new_v4().to_string(),
        call.name,
        arguments,
    ));
}

/// Inline code arrives complete per part; it is rendered as one fenced block
/// through the same open/continue/close shape the code-interpreter path uses.
fn push_code_block(out: &mut String, code: &GeminiExecutableCode) {
    let Some(ref body) = code.code else { return };
    let language = code
        .language
        .as_deref()
        .unwrap_or("python")
        .to_ascii_lowercase();
    out.push_str(&format!("```{language}\n{body}"));
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n");
}

fn write_inline_image(ctx: &mut DecodeCtx<'_>, state: &mut RunState, blob: &GeminiBlob) {
    let is_image = blob
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.starts_with("image/"));
    let Some(ref data) = blob.data else { return };
    if !is_image {
        return;
    }
    let bytes = match base64::engine::general_purpose::STANDARD.decode(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "dropping undecodable inline image");
            return;
        }
    };
    match ctx
        .images
        .reserve_path(ctx.turn)
        .and_then(|path| ctx.images.write(&path, &bytes).map(|()| path))
    {
        Ok(path) => {
            ctx.turn.push_image(path.clone());
            state.image_paths.push(path);
            state.produced_image = true;
        }
        Err(e) => warn!(error = %e, "failed to store inline image"),
    }
}

fn remote_image_url(file: &GeminiFileData) -> Option<&str> {
    let uri = file.file_uri.as_deref()?;
    let is_http = uri.starts_with("http://") || uri.starts_with("https://");
    let is_image = file
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.starts_with("image/"));
    (is_http && is_image).then_some(uri)
}

/// Grounding/citation URLs hide under several nested paths whose spelling
/// varies by SDK version. Probe order is canonical: snake_case first, then
/// camelCase, per candidate and then per part.
fn harvest_citations(ctx: &mut DecodeCtx<'_>, state: &mut RunState, payload: &Value) {
    let Some(candidates) = payload.get("candidates").and_then(|c| c.as_array()) else {
        return;
    };
    let mut found = Vec::new();
    for candidate in candidates {
        collect_candidate_urls(candidate, &mut found);
        if let Some(parts) = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
        {
            for part in parts {
                collect_candidate_urls(part, &mut found);
            }
        }
    }
    for url in found {
        state.push_citation(&url);
        ctx.turn.push_url(url);
    }
}

fn collect_candidate_urls(container: &Value, out: &mut Vec<String>) {
    if let Some(grounding) = first_present(container, &["grounding_metadata", "groundingMetadata"])
    {
        if let Some(chunks) = first_present(grounding, &["grounding_chunks", "groundingChunks"])
            .and_then(|c| c.as_array())
        {
            for chunk in chunks {
                if let Some(web) = chunk.get("web") {
                    push_uri(web, out);
                }
            }
        }
    }
    if let Some(citation) = first_present(container, &["citation_metadata", "citationMetadata"]) {
        if let Some(sources) =
            first_present(citation, &["citation_sources", "citationSources", "citations"])
                .and_then(|s| s.as_array())
        {
            for source in sources {
                push_uri(source, out);
            }
        }
    }
}

fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| value.get(key))
}

fn push_uri(value: &Value, out: &mut Vec<String>) {
    if let Some(uri) = first_present(value, &["uri", "url"]).and_then(|u| u.as_str()) {
        if !out.iter().any(|seen| seen == uri) {
            out.push(uri.to_string());
        }
    }
}

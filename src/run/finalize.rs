//! One-time consolidation of run state into the finished turn.

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::types::{RunEventPayload, TurnResult};

use super::driver::EventEmitter;
use super::state::RunState;
use super::{RunContext, RunOutcome};

/// Build the final output, resolve usage, persist, trigger downloads, emit
/// the terminal event(s), and release every per-run buffer. Runs exactly once
/// per run regardless of how the loop exited.
pub(crate) async fn finalize(
    ctx: &RunContext,
    emitter: &mut EventEmitter,
    state: &mut RunState,
    turn: &mut TurnResult,
) -> Result<RunOutcome> {
    let mut output = std::mem::take(&mut state.output);
    if has_unterminated_fence(&output) {
        if !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("```\n");
    }
    turn.output = output;

    // Token counts are written exactly once: captured usage wins, otherwise
    // whatever was already on the turn plus the counted deltas.
    let input_tokens = state.usage.input_tokens.unwrap_or(turn.input_tokens);
    let output_tokens = state
        .usage
        .output_tokens
        .unwrap_or(state.output_token_count);
    turn.input_tokens = input_tokens;
    turn.output_tokens = output_tokens;

    if !state.calls.is_empty() {
        let mut calls = state.calls.take_entries();
        for call in &mut calls {
            call.function.arguments = normalize_arguments(&call.function.arguments);
        }
        turn.tool_calls = calls;
    }

    let protocol = state.usage_protocol.or(state.protocol);
    turn.extra.insert(
        "usage".to_string(),
        serde_json::json!({
            "protocol": protocol.map(|p| p.to_string()),
            "input_tokens": input_tokens,
            "output_tokens": output_tokens,
            "reasoning_tokens": state.usage.reasoning_tokens,
            "total_tokens": state.usage.total_tokens,
        }),
    );
    turn.updated_at = Utc::now();

    if let Err(e) = ctx.store.upsert(turn).await {
        warn!(run_id = %turn.id, error = %e, "failed to persist finalized turn");
    }

    if !state.container_files.is_empty() && !state.stopped && ctx.fetch_files {
        if let Some(ref fetcher) = ctx.files {
            if let Err(e) = fetcher.fetch(turn, &state.container_files).await {
                warn!(run_id = %turn.id, error = %e, "container file download failed");
            }
        }
    }

    let error = state.error.take();
    if let Some(ref e) = error {
        emitter.emit(RunEventPayload::Error {
            message: e.to_string(),
        });
    }
    emitter.emit(RunEventPayload::Ended {
        result: turn.clone(),
    });

    let outcome = RunOutcome {
        stopped: state.stopped,
        force_function_call: state.force_function_call,
    };
    state.release();

    match error {
        Some(e) => Err(e),
        None => Ok(outcome),
    }
}

/// Normalize a streamed argument accumulator into valid JSON text.
///
/// Text that already parses is kept byte-for-byte, so re-application is a
/// no-op; anything else is wrapped as a JSON string literal; empty buffers
/// become an empty object.
pub(crate) fn normalize_arguments(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return trimmed.to_string();
    }
    serde_json::Value::String(raw.to_string()).to_string()
}

/// A text ends inside a fenced code block when the fence count is odd.
pub(crate) fn has_unterminated_fence(text: &str) -> bool {
    text.matches("```").count() % 2 == 1
}

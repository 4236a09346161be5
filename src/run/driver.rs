//! The orchestrator loop: iterate, classify, decode, emit.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::hooks::ChunkSource;
use crate::protocol::{self, classify, DecodeCtx};
use crate::types::{EventSink, RunEvent, RunEventPayload, TurnResult};

use super::finalize;
use super::state::RunState;
use super::{RunContext, RunOutcome};

/// Sequenced event emission for one run.
pub(crate) struct EventEmitter {
    sink: EventSink,
    run_id: Uuid,
    seq: u64,
}

impl EventEmitter {
    fn new(sink: EventSink, run_id: Uuid) -> Self {
        Self {
            sink,
            run_id,
            seq: 0,
        }
    }

    pub(crate) fn emit(&mut self, payload: RunEventPayload) {
        let event = RunEvent::new(self.run_id, self.seq, payload);
        self.seq += 1;
        (self.sink)(event);
    }
}

/// Drive one streaming run to its terminal event.
///
/// The loop owns the source and the run state; each iteration polls
/// cancellation, checks for a previously flagged error, classifies the next
/// chunk (unless a protocol is forced), decodes it, and emits the resulting
/// text delta. Whatever way the loop exits, consolidation and finalization
/// run, the turn is persisted, and exactly one end event is emitted.
pub async fn drive<S: ChunkSource>(
    ctx: &RunContext,
    mut source: S,
    turn: &mut TurnResult,
) -> Result<RunOutcome> {
    let mut emitter = EventEmitter::new(ctx.events.clone(), turn.id);
    let mut state = RunState::new();

    debug!(run_id = %turn.id, "stream run started");
    emitter.emit(RunEventPayload::Started);

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(run_id = %turn.id, "cancellation requested, stopping source");
            source.halt().await;
            state.stopped = true;
            break;
        }

        if state.error.is_some() {
            turn.message_id = None;
            state.stopped = true;
            break;
        }

        let Some(next) = source.next_chunk().await else {
            break;
        };
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(run_id = %turn.id, error = %e, "chunk source failed mid-stream");
                state.error = Some(e);
                continue;
            }
        };

        let protocol = ctx
            .forced_protocol
            .unwrap_or_else(|| classify(&chunk.payload));
        if state.protocol != Some(protocol) {
            debug!(run_id = %turn.id, protocol = %protocol, "decoding stream");
        }
        state.protocol = Some(protocol);

        let delta = {
            let mut dctx = DecodeCtx {
                turn: &mut *turn,
                images: ctx.images.as_ref(),
                item_hook: ctx.item_hook.as_deref(),
            };
            protocol::decode(protocol, &mut dctx, &mut state, &chunk)
        };

        if state.pending_upsert {
            state.pending_upsert = false;
            if let Err(e) = ctx.store.upsert(turn).await {
                warn!(run_id = %turn.id, error = %e, "mid-run persist failed");
            }
        }

        if let Some(text) = delta {
            if !text.is_empty() && !state.stopped {
                state.output.push_str(&text);
                state.output_token_count += 1;
                let first = state.first_delta;
                state.first_delta = false;
                emitter.emit(RunEventPayload::Delta { text, first });
            }
        }
    }

    consolidate(&mut state, turn);

    // Late usage resolution: some providers only report usage once the
    // exhausted stream object is explicitly resolved.
    if state.usage.is_empty() {
        if let Some(resolved) = source.resolve_usage().await {
            let protocol = state.protocol.unwrap_or(protocol::Protocol::Raw);
            state.record_usage(protocol, &resolved);
        }
    }

    finalize::finalize(ctx, &mut emitter, &mut state, turn).await
}

/// Post-loop consolidation: argument JSON normalization, image-list merge,
/// citation merge, and the paired-tuple terminal fallback.
fn consolidate(state: &mut RunState, turn: &mut TurnResult) {
    for entry in state.calls.entries_mut() {
        entry.function.arguments = finalize::normalize_arguments(&entry.function.arguments);
    }

    if state.produced_image {
        for path in state.image_paths.clone() {
            turn.push_image(path);
        }
    }

    for url in state.citations.clone() {
        turn.push_url(url);
    }

    if let Some(response) = state.last_response.take() {
        protocol::xai::absorb_final_response(state, turn, &response);
    }
}

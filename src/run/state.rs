//! Mutable state threaded through one streaming run.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::EstuaryError;
use crate::protocol::Protocol;
use crate::types::{ContainerFileRef, ToolCall, Usage};

/// Reserved argument-buffer key for "the most recently opened call".
///
/// Some vendors stream argument deltas without any block identifier; those
/// fragments land here and are mirrored into the last tool-call entry.
pub const RECENT_CALL_KEY: &str = "__recent__";

/// Ephemeral state owned by exactly one streaming run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Accumulated visible output.
    pub output: String,
    /// Count of accepted text deltas.
    pub output_token_count: u64,
    /// True until the first visible delta has been emitted.
    pub first_delta: bool,
    /// Tool calls assembled from streamed fragments.
    pub calls: ToolCallTable,
    /// Per-call argument accumulators, keyed by call id, stringified block
    /// index, or [`RECENT_CALL_KEY`].
    pub argument_buffers: HashMap<String, String>,
    /// Citation URLs in order of first appearance.
    pub citations: Vec<String>,
    /// Images written during this run.
    pub image_paths: Vec<PathBuf>,
    /// Container files referenced by the stream (fetched at finalization).
    pub container_files: Vec<ContainerFileRef>,
    /// Usage fragments captured incrementally.
    pub usage: Usage,
    /// Protocol that contributed the usage payload.
    pub usage_protocol: Option<Protocol>,
    /// Protocol detected for this run.
    pub protocol: Option<Protocol>,
    /// Last accumulated-response object seen on a paired-tuple stream;
    /// consulted after the loop only if nothing was extracted incrementally.
    pub last_response: Option<Value>,
    /// An inline code fence is currently open.
    pub code_fence_open: bool,
    /// At least one image was decoded this run.
    pub produced_image: bool,
    /// A decoder asked for an immediate persistence push.
    pub pending_upsert: bool,
    pub stopped: bool,
    /// The provider signaled a tool-use stop; the caller must run the calls.
    pub force_function_call: bool,
    pub error: Option<EstuaryError>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            first_delta: true,
            ..Default::default()
        }
    }

    /// Append an argument fragment to the buffer for `key`.
    pub fn append_argument(&mut self, key: &str, fragment: &str) {
        self.argument_buffers
            .entry(key.to_string())
            .or_default()
            .push_str(fragment);
    }

    /// Remove and return the buffer for `key`.
    pub fn take_argument_buffer(&mut self, key: &str) -> Option<String> {
        self.argument_buffers.remove(key)
    }

    /// Record a citation URL unless already present.
    pub fn push_citation(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !self.citations.contains(&url) {
            self.citations.push(url);
        }
    }

    /// Merge a usage fragment, remembering which protocol reported it.
    pub fn record_usage(&mut self, protocol: Protocol, usage: &Usage) {
        self.usage.merge(usage);
        self.usage_protocol = Some(protocol);
    }

    /// Drop every per-run accumulator. Runs unconditionally at finalization.
    pub fn release(&mut self) {
        self.calls = ToolCallTable::default();
        self.argument_buffers.clear();
        self.citations.clear();
        self.last_response = None;
    }
}

/// Ordered tool-call entries plus a side index from id/position keys.
///
/// Entries are created lazily and the table grows to cover out-of-order
/// vendor indices with empty placeholders.
#[derive(Debug, Default)]
pub struct ToolCallTable {
    entries: Vec<ToolCall>,
    index: HashMap<String, usize>,
}

impl ToolCallTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ToolCall] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut ToolCall> {
        self.entries.iter_mut()
    }

    /// Grow the table (with placeholders) so `position` exists, and return it.
    pub fn ensure_slot(&mut self, position: usize) -> &mut ToolCall {
        while self.entries.len() <= position {
            self.entries.push(ToolCall::placeholder());
        }
        &mut self.entries[position]
    }

    /// Append a fresh entry reachable under each of `keys`.
    pub fn open_call(&mut self, call: ToolCall, keys: &[&str]) -> usize {
        let position = self.entries.len();
        self.entries.push(call);
        for key in keys {
            if !key.is_empty() {
                self.index.insert((*key).to_string(), position);
            }
        }
        position
    }

    /// Look up an entry by a previously registered key.
    pub fn get_by_key(&mut self, key: &str) -> Option<&mut ToolCall> {
        let position = *self.index.get(key)?;
        self.entries.get_mut(position)
    }

    /// Register `key` as an alias for an existing position.
    pub fn alias(&mut self, key: &str, position: usize) {
        if position < self.entries.len() {
            self.index.insert(key.to_string(), position);
        }
    }

    pub fn last_mut(&mut self) -> Option<&mut ToolCall> {
        self.entries.last_mut()
    }

    /// Replace the whole table with a single entry (snapshot-style vendors
    /// report the complete current call on every chunk).
    pub fn replace_with(&mut self, call: ToolCall) {
        self.entries.clear();
        self.index.clear();
        let id = call.id.clone();
        self.open_call(call, &[id.as_str()]);
    }

    /// Append unless an entry with the same name and arguments exists.
    pub fn push_unique(&mut self, call: ToolCall) -> bool {
        let duplicate = self.entries.iter().any(|existing| {
            existing.function.name == call.function.name
                && existing.function.arguments == call.function.arguments
        });
        if duplicate {
            return false;
        }
        let id = call.id.clone();
        self.open_call(call, &[id.as_str()]);
        true
    }

    /// Drain the assembled entries, clearing the index.
    pub fn take_entries(&mut self) -> Vec<ToolCall> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

/// Append a streamed fragment, skipping fragments already fully appended.
///
/// Vendors occasionally resend the tail fragment of an id/name/arguments
/// string; appending must never duplicate text.
pub fn append_fragment(target: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !target.is_empty() && target.ends_with(fragment) {
        return;
    }
    target.push_str(fragment);
}

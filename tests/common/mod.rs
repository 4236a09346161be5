//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use estuary::error::Result;
use estuary::hooks::{ChunkSource, FileFetcher, ResultStore};
use estuary::types::{ContainerFileRef, EventSink, RawChunk, RunEvent, TurnResult, Usage};

/// A chunk source driven by a pre-scripted list, tracking graceful stops.
pub struct ScriptedSource {
    chunks: VecDeque<Result<RawChunk>>,
    pub halts: Arc<AtomicUsize>,
    late_usage: Option<Usage>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<Result<RawChunk>>) -> Self {
        Self {
            chunks: chunks.into(),
            halts: Arc::new(AtomicUsize::new(0)),
            late_usage: None,
        }
    }

    /// Usage only reported when the exhausted stream is resolved.
    pub fn with_late_usage(mut self, usage: Usage) -> Self {
        self.late_usage = Some(usage);
        self
    }
}

#[async_trait]
impl ChunkSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Option<Result<RawChunk>> {
        self.chunks.pop_front()
    }

    async fn halt(&mut self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }

    async fn resolve_usage(&mut self) -> Option<Usage> {
        self.late_usage.take()
    }
}

/// An event sink that records everything it sees.
pub fn collecting_sink() -> (EventSink, Arc<Mutex<Vec<RunEvent>>>) {
    let events: Arc<Mutex<Vec<RunEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: EventSink = Arc::new(move |event| captured.lock().unwrap().push(event));
    (sink, events)
}

/// A result store that counts upserts.
pub struct CountingStore(pub Arc<AtomicUsize>);

#[async_trait]
impl ResultStore for CountingStore {
    async fn upsert(&self, _turn: &TurnResult) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A file fetcher that counts the references it is asked to download.
pub struct RecordingFetcher(pub Arc<AtomicUsize>);

#[async_trait]
impl FileFetcher for RecordingFetcher {
    async fn fetch(&self, _turn: &TurnResult, files: &[ContainerFileRef]) -> Result<()> {
        self.0.fetch_add(files.len(), Ordering::SeqCst);
        Ok(())
    }
}

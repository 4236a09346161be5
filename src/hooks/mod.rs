//! Collaborator seams consumed by a streaming run.
//!
//! The core never opens connections itself: chunks come in through
//! [`ChunkSource`], results go out through [`ResultStore`], and the narrow
//! side effects (image writes, container-file downloads, the Responses-API
//! item post-processor) each get their own trait so callers can plug in or
//! omit them.

pub mod images;

pub use images::{DirImageStore, DiscardImages};

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::Result;
use crate::run::state::RunState;
use crate::types::{ContainerFileRef, RawChunk, TurnResult, Usage};

/// A sequence of provider-native chunks.
///
/// `halt` replaces duck-typed probing for `stop`/`cancel`/`close` on the
/// underlying generator: adapters implement whatever graceful stop their
/// transport supports (possibly nothing), and the orchestrator calls it
/// exactly once when cancellation is requested. `resolve_usage` covers
/// vendors whose usage is only available once the exhausted stream object is
/// explicitly resolved.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Option<Result<RawChunk>>;

    /// Best-effort graceful stop; failures are the adapter's to swallow.
    async fn halt(&mut self) {}

    /// Late usage resolution, consulted only when nothing was captured
    /// incrementally.
    async fn resolve_usage(&mut self) -> Option<Usage> {
        None
    }
}

/// Adapter turning any chunk stream into a [`ChunkSource`].
pub struct StreamSource<S> {
    inner: S,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Result<RawChunk>> + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { inner: stream }
    }
}

/// Boxed-stream convenience used by tests and simple callers.
pub type BoxChunkStream = Pin<Box<dyn Stream<Item = Result<RawChunk>> + Send>>;

#[async_trait]
impl<S> ChunkSource for StreamSource<S>
where
    S: Stream<Item = Result<RawChunk>> + Send + Unpin,
{
    async fn next_chunk(&mut self) -> Option<Result<RawChunk>> {
        self.inner.next().await
    }
}

/// Push-style source: the sender side hands chunks to a run as they arrive
/// from a provider callback; dropping the sender ends the stream.
pub fn channel_source(
    capacity: usize,
) -> (
    tokio::sync::mpsc::Sender<Result<RawChunk>>,
    StreamSource<tokio_stream::wrappers::ReceiverStream<Result<RawChunk>>>,
) {
    let (tx, rx) = tokio::sync::mpsc::channel(capacity);
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx);
    (tx, StreamSource::new(stream))
}

/// Persistence seam: "upsert this turn". Called at least once at
/// finalization and possibly mid-run when a decoder requests a push.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert(&self, turn: &TurnResult) -> Result<()>;
}

/// A store that drops every write; the default when a caller only wants the
/// event stream.
pub struct DiscardStore;

#[async_trait]
impl ResultStore for DiscardStore {
    async fn upsert(&self, _turn: &TurnResult) -> Result<()> {
        Ok(())
    }
}

/// Storage seam for decoded image bytes. Writing is the one piece of I/O a
/// decoder may perform, and it is bounded to a single local write per image.
pub trait ImageStore: Send + Sync {
    /// Produce a fresh unique path for this turn's next image.
    fn reserve_path(&self, turn: &TurnResult) -> Result<PathBuf>;

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Download seam for provider-side container files, triggered at
/// finalization.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, turn: &TurnResult, files: &[ContainerFileRef]) -> Result<()>;
}

/// Post-processor for Responses-API `output_item.done` items (computer-use
/// and similar tool records). May append tool calls and flag
/// force-function-call on the run state.
pub trait ItemHook: Send + Sync {
    fn on_item_done(&self, item: &Value, state: &mut RunState);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stream_source_yields_in_order() {
        let stream = futures::stream::iter(vec![
            Ok(RawChunk::text("a")),
            Ok(RawChunk::json(json!({"k": 1}))),
        ]);
        let mut source = StreamSource::new(stream);
        assert_eq!(
            source.next_chunk().await.unwrap().unwrap().payload,
            json!("a")
        );
        assert!(source.next_chunk().await.is_some());
        assert!(source.next_chunk().await.is_none());
        // default capabilities are no-ops
        source.halt().await;
        assert!(source.resolve_usage().await.is_none());
    }
}

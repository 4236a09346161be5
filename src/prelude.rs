//! Convenience re-exports for common use.

pub use crate::config::NormalizerConfig;
pub use crate::error::{EstuaryError, Result};
pub use crate::hooks::{
    ChunkSource, DirImageStore, FileFetcher, ImageStore, ItemHook, ResultStore, StreamSource,
};
pub use crate::protocol::{classify, Protocol};
pub use crate::run::{RunContext, RunOutcome};
pub use crate::types::{
    ContainerFileRef, EventSink, RawChunk, RunEvent, RunEventPayload, ToolCall, TurnResult, Usage,
};

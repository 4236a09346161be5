//! Streaming run orchestration.

pub mod driver;
pub mod finalize;
pub mod state;

pub use driver::drive;
pub use state::{RunState, ToolCallTable, RECENT_CALL_KEY};

use std::sync::Arc;

use bon::Builder;
use tokio_util::sync::CancellationToken;

use crate::config::NormalizerConfig;
use crate::hooks::{
    DirImageStore, DiscardStore, FileFetcher, ImageStore, ItemHook, ResultStore,
};
use crate::protocol::Protocol;
use crate::types::EventSink;

/// Collaborators for one streaming run.
///
/// Every seam has a workable default: events go nowhere, persistence is
/// discarded, images land under the configured image directory. Cancellation
/// is cooperative; cancel the token and the loop stops at its next
/// iteration.
#[derive(Builder)]
pub struct RunContext {
    #[builder(default = noop_events())]
    pub events: EventSink,
    #[builder(default = discard_store())]
    pub store: Arc<dyn ResultStore>,
    #[builder(default = default_images())]
    pub images: Arc<dyn ImageStore>,
    pub files: Option<Arc<dyn FileFetcher>>,
    pub item_hook: Option<Arc<dyn ItemHook>>,
    #[builder(default)]
    pub cancel: CancellationToken,
    /// Skip classification and treat every chunk as this protocol. Set for
    /// event-framed transports (Responses API) where the shape is known
    /// out-of-band.
    pub forced_protocol: Option<Protocol>,
    #[builder(default = true)]
    pub fetch_files: bool,
}

impl RunContext {
    /// A context with defaults drawn from a loaded config.
    pub fn from_config(config: &NormalizerConfig) -> Self {
        RunContext::builder()
            .images(Arc::new(DirImageStore::from_config(config)))
            .maybe_forced_protocol(config.forced_protocol)
            .fetch_files(config.fetch_files)
            .build()
    }
}

fn noop_events() -> EventSink {
    Arc::new(|_| {})
}

fn discard_store() -> Arc<dyn ResultStore> {
    Arc::new(DiscardStore)
}

fn default_images() -> Arc<dyn ImageStore> {
    Arc::new(DirImageStore::from_config(NormalizerConfig::global()))
}

/// What a completed run looked like, beyond the result itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// The run ended early (cancellation or a flagged error).
    pub stopped: bool,
    /// The provider stopped specifically to have its tool calls executed.
    pub force_function_call: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_follow_config() {
        let config = NormalizerConfig {
            image_dir: std::env::temp_dir(),
            forced_protocol: Some(Protocol::Anthropic),
            fetch_files: false,
        };
        let ctx = RunContext::from_config(&config);
        assert_eq!(ctx.forced_protocol, Some(Protocol::Anthropic));
        assert!(!ctx.fetch_files);
    }
}

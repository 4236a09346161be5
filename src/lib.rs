//! Estuary — vendor-neutral streaming response normalizer.
//!
//! Consumes a live, provider-specific sequence of incremental response
//! chunks from any of several LLM streaming protocols and turns it into a
//! single vendor-neutral incremental result: text deltas, assembled tool
//! calls, usage accounting, citations, generated images and attached files.
//! Runs are cooperatively cancellable and resilient to partial failures
//! mid-stream.
//!
//! # Quick Start
//!
//! ```no_run
//! use estuary::prelude::*;
//! use futures::stream;
//! use serde_json::json;
//!
//! # async fn example() -> estuary::error::Result<()> {
//! let chunks = stream::iter(vec![
//!     Ok(RawChunk::json(json!({"choices": [{"delta": {"content": "Hello"}}]}))),
//! ]);
//! let ctx = RunContext::builder().build();
//! let mut turn = TurnResult::new();
//! let outcome = estuary::run::drive(&ctx, StreamSource::new(chunks), &mut turn).await?;
//! assert_eq!(turn.output, "Hello");
//! assert!(!outcome.stopped);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod prelude;
pub mod protocol;
pub mod run;
pub mod types;

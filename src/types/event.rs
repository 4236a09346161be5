//! Run event stream types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::TurnResult;

/// Callback used for streaming run events.
pub type EventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Envelope for events emitted over one streaming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

/// Concrete event payloads.
///
/// A run emits `Started` once, any number of `Delta`s, then `Error` (only if
/// the run failed) followed by exactly one `Ended`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Started,
    Delta {
        text: String,
        /// True on the first visible delta of the run.
        first: bool,
    },
    Error {
        message: String,
    },
    Ended {
        result: TurnResult,
    },
}

impl RunEvent {
    pub fn new(run_id: Uuid, seq: u64, payload: RunEventPayload) -> Self {
        Self {
            run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        }
    }
}

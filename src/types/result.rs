//! The persisted conversation turn a run writes into.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One assistant turn, owned by the caller and filled in by a streaming run.
///
/// `output`, the token counts, and `tool_calls` are authoritative only after
/// finalization; `urls` and `images` may grow mid-run so a polling caller can
/// render them early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub id: Uuid,
    /// Provider-side correlation id (e.g. a Responses API response id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Finalized assistant output.
    pub output: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Paths of images generated during the run, deduplicated, in order.
    pub images: Vec<PathBuf>,
    /// Citation URLs, deduplicated, in order of first appearance.
    pub urls: Vec<String>,
    /// Assembled tool calls; `function.arguments` is valid JSON text once
    /// the terminal event has been emitted.
    pub tool_calls: Vec<ToolCall>,
    /// Free-form diagnostic metadata attached at finalization.
    pub extra: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl TurnResult {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            message_id: None,
            output: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            images: Vec::new(),
            urls: Vec::new(),
            tool_calls: Vec::new(),
            extra: serde_json::Map::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a citation URL unless it is already recorded.
    pub fn push_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !self.urls.contains(&url) {
            self.urls.push(url);
        }
    }

    /// Append an image path unless it is already recorded.
    pub fn push_image(&mut self, path: PathBuf) {
        if !self.images.contains(&path) {
            self.images.push(path);
        }
    }
}

impl Default for TurnResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    /// Always `"function"` for the providers covered here.
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    /// An empty placeholder entry, grown later by streamed fragments.
    pub fn placeholder() -> Self {
        Self {
            id: String::new(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: String::new(),
                arguments: String::new(),
            },
        }
    }

    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// The function half of a tool call.
///
/// `arguments` is a plain text accumulator while a run is live and is
/// normalized to valid JSON text during finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A file generated inside a provider-side container (code interpreter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerFileRef {
    pub container_id: String,
    pub file_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_images_deduplicate() {
        let mut turn = TurnResult::new();
        turn.push_url("https://example.com/a");
        turn.push_url("https://example.com/a");
        turn.push_url("https://example.com/b");
        assert_eq!(turn.urls.len(), 2);

        turn.push_image(PathBuf::from("/tmp/x.png"));
        turn.push_image(PathBuf::from("/tmp/x.png"));
        assert_eq!(turn.images.len(), 1);
    }

    #[test]
    fn tool_call_serializes_with_type_field() {
        let call = ToolCall::new("call_1", "lookup", "{}");
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "lookup");
    }
}

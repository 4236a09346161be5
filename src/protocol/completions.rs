//! Legacy text-completions streaming decoder.

use serde::Deserialize;

use crate::types::RawChunk;

#[derive(Debug, Default, Deserialize)]
struct CompletionsChunk {
    #[serde(default)]
    choices: Vec<CompletionsChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionsChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Legacy completions carry no tool calls and no usage; the delta is just
/// `choices[0].text`.
pub(super) fn decode(chunk: &RawChunk) -> Option<String> {
    let parsed: CompletionsChunk = serde_json::from_value(chunk.payload.clone()).ok()?;
    parsed
        .choices
        .into_iter()
        .next()?
        .text
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_choice_text() {
        let chunk = RawChunk::json(json!({"choices": [{"text": "plain"}]}));
        assert_eq!(decode(&chunk), Some("plain".to_string()));
    }

    #[test]
    fn empty_or_missing_text_yields_nothing() {
        assert_eq!(decode(&RawChunk::json(json!({"choices": [{"text": ""}]}))), None);
        assert_eq!(decode(&RawChunk::json(json!({"choices": [{}]}))), None);
        assert_eq!(decode(&RawChunk::json(json!({}))), None);
    }
}

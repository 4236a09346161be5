//! Per-vendor usage payload extraction.

use serde_json::Value;

use super::Protocol;
use crate::types::Usage;

/// Pull normalized token counts out of a vendor-specific usage payload.
///
/// Returns `None` when the payload carries nothing recognizable; partial
/// payloads (a lone `output_tokens`, say) are normal and merge into whatever
/// was captured earlier in the run.
pub fn extract(protocol: Protocol, payload: &Value) -> Option<Usage> {
    let usage = match protocol {
        Protocol::Anthropic => Usage {
            input_tokens: count(payload, &["input_tokens"]),
            output_tokens: count(payload, &["output_tokens"]),
            reasoning_tokens: None,
            total_tokens: None,
            cache_read_tokens: count(payload, &["cache_read_input_tokens"]),
            cache_creation_tokens: count(payload, &["cache_creation_input_tokens"]),
        },
        Protocol::Google => Usage {
            input_tokens: count(payload, &["prompt_token_count", "promptTokenCount"]),
            output_tokens: count(payload, &["candidates_token_count", "candidatesTokenCount"]),
            reasoning_tokens: count(payload, &["thoughts_token_count", "thoughtsTokenCount"]),
            total_tokens: count(payload, &["total_token_count", "totalTokenCount"]),
            cache_read_tokens: count(
                payload,
                &["cached_content_token_count", "cachedContentTokenCount"],
            ),
            cache_creation_tokens: None,
        },
        Protocol::ResponsesApi => Usage {
            input_tokens: count(payload, &["input_tokens"]),
            output_tokens: count(payload, &["output_tokens"]),
            reasoning_tokens: nested_count(payload, "output_tokens_details", "reasoning_tokens"),
            total_tokens: count(payload, &["total_tokens"]),
            cache_read_tokens: nested_count(payload, "input_tokens_details", "cached_tokens"),
            cache_creation_tokens: None,
        },
        // Chat Completions and everything speaking its dialect: OpenAI
        // spellings first, generic input/output spellings as fallback.
        _ => Usage {
            input_tokens: count(payload, &["prompt_tokens", "input_tokens"]),
            output_tokens: count(payload, &["completion_tokens", "output_tokens"]),
            reasoning_tokens: nested_count(payload, "completion_tokens_details", "reasoning_tokens")
                .or_else(|| nested_count(payload, "output_tokens_details", "reasoning_tokens")),
            total_tokens: count(payload, &["total_tokens"]),
            cache_read_tokens: nested_count(payload, "prompt_tokens_details", "cached_tokens"),
            cache_creation_tokens: None,
        },
    };

    if usage.is_empty() {
        None
    } else {
        Some(usage)
    }
}

fn count(payload: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| payload.get(key)?.as_u64())
}

fn nested_count(payload: &Value, outer: &str, inner: &str) -> Option<u64> {
    payload.get(outer)?.get(inner)?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completions_spellings_with_fallback() {
        let usage = extract(
            Protocol::ChatCompletions,
            &json!({"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}),
        )
        .unwrap();
        assert_eq!(usage.input_tokens, Some(3));
        assert_eq!(usage.total_tokens, Some(8));

        let fallback = extract(
            Protocol::XaiSdk,
            &json!({"input_tokens": 2, "output_tokens": 4}),
        )
        .unwrap();
        assert_eq!(fallback.input_tokens, Some(2));
        assert_eq!(fallback.output_tokens, Some(4));
    }

    #[test]
    fn reasoning_detail_objects_are_read() {
        let usage = extract(
            Protocol::ChatCompletions,
            &json!({
                "completion_tokens": 10,
                "completion_tokens_details": {"reasoning_tokens": 6},
            }),
        )
        .unwrap();
        assert_eq!(usage.reasoning_tokens, Some(6));

        let responses = extract(
            Protocol::ResponsesApi,
            &json!({
                "input_tokens": 1,
                "output_tokens": 2,
                "output_tokens_details": {"reasoning_tokens": 2},
            }),
        )
        .unwrap();
        assert_eq!(responses.reasoning_tokens, Some(2));
    }

    #[test]
    fn google_accepts_both_spellings() {
        let camel = extract(
            Protocol::Google,
            &json!({"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}),
        )
        .unwrap();
        assert_eq!(camel.input_tokens, Some(4));

        let snake = extract(
            Protocol::Google,
            &json!({"prompt_token_count": 4, "candidates_token_count": 6}),
        )
        .unwrap();
        assert_eq!(snake.output_tokens, Some(6));
    }

    #[test]
    fn anthropic_partial_payloads_extract() {
        let start = extract(Protocol::Anthropic, &json!({"input_tokens": 12})).unwrap();
        assert_eq!(start.input_tokens, Some(12));
        assert_eq!(start.output_tokens, None);

        let delta = extract(Protocol::Anthropic, &json!({"output_tokens": 30})).unwrap();
        assert_eq!(delta.output_tokens, Some(30));
    }

    #[test]
    fn unrecognizable_payload_is_none() {
        assert_eq!(extract(Protocol::ChatCompletions, &json!({"tokens": 1})), None);
        assert_eq!(extract(Protocol::Anthropic, &json!(null)), None);
    }
}

//! Token usage accounting.

use serde::{Deserialize, Serialize};

/// Normalized token counts for one streaming run.
///
/// Every field is optional: vendors report different subsets, often only on
/// the final chunk of a stream, and some not until the exhausted stream is
/// explicitly resolved.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
}

impl Usage {
    /// Merge a later usage fragment into this one. Fields the fragment
    /// actually carries win; everything else is left as captured.
    pub fn merge(&mut self, other: &Usage) {
        if other.input_tokens.is_some() {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens.is_some() {
            self.output_tokens = other.output_tokens;
        }
        if other.reasoning_tokens.is_some() {
            self.reasoning_tokens = other.reasoning_tokens;
        }
        if other.total_tokens.is_some() {
            self.total_tokens = other.total_tokens;
        }
        if other.cache_read_tokens.is_some() {
            self.cache_read_tokens = other.cache_read_tokens;
        }
        if other.cache_creation_tokens.is_some() {
            self.cache_creation_tokens = other.cache_creation_tokens;
        }
    }

    /// True when no vendor payload contributed anything yet.
    pub fn is_empty(&self) -> bool {
        *self == Usage::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_earlier_fields_the_fragment_omits() {
        let mut usage = Usage {
            input_tokens: Some(12),
            ..Default::default()
        };
        usage.merge(&Usage {
            output_tokens: Some(34),
            ..Default::default()
        });
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(34));
    }

    #[test]
    fn merge_overwrites_fields_the_fragment_carries() {
        let mut usage = Usage {
            output_tokens: Some(1),
            ..Default::default()
        };
        usage.merge(&Usage {
            output_tokens: Some(99),
            ..Default::default()
        });
        assert_eq!(usage.output_tokens, Some(99));
    }

    #[test]
    fn default_is_empty() {
        assert!(Usage::default().is_empty());
        assert!(!Usage {
            total_tokens: Some(0),
            ..Default::default()
        }
        .is_empty());
    }
}

//! Normalized response envelope returned by the orchestrator

use serde::{Deserialize, Serialize};

/// Token usage breakdown for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create a usage record; the total is derived
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Reason for completion finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response)
    Stop,
    /// Max tokens reached
    Length,
    /// Tool/function calls requested
    ToolCalls,
    /// Content filtered by safety system
    ContentFilter,
    /// Error occurred
    Error,
    /// Unknown reason (catch-all)
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::Error => write!(f, "error"),
            FinishReason::Unknown => write!(f, "unknown"),
        }
    }
}

impl FinishReason {
    /// Parse a vendor finish reason string, mapping anything unrecognized to `Unknown`
    pub fn from_vendor(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | Some("end_turn") => Self::Stop,
            Some("length") | Some("max_tokens") => Self::Length,
            Some("tool_calls") | Some("tool_use") => Self::ToolCalls,
            Some("content_filter") => Self::ContentFilter,
            Some("error") => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Standard response envelope, identical in shape for every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Request id of the call that produced this response
    pub request_id: String,
    /// Generated text (completion tasks)
    pub text: Option<String>,
    /// Embedding vector (embedding tasks)
    pub embedding: Option<Vec<f32>>,
    /// Token usage
    pub usage: TokenUsage,
    /// Wall-clock latency of the provider call
    pub latency_ms: u64,
    /// Model that served the request
    pub model: String,
    /// Provider that served the request
    pub provider: String,
    /// Reason the generation stopped
    pub finish_reason: FinishReason,
    /// Cost of the call in USD
    pub cost_usd: f64,
    /// Whether this response was served from the cache
    pub from_cache: bool,
    /// Number of sibling providers tried before this one answered
    pub fallback_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_token_usage_total_saturates() {
        let usage = TokenUsage::new(u32::MAX, 10);
        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn test_finish_reason_from_vendor() {
        assert_eq!(FinishReason::from_vendor(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_vendor(Some("max_tokens")), FinishReason::Length);
        assert_eq!(FinishReason::from_vendor(Some("weird")), FinishReason::Unknown);
        assert_eq!(FinishReason::from_vendor(None), FinishReason::Unknown);
    }

    #[test]
    fn test_finish_reason_deserialize_unknown() {
        let reason: FinishReason = serde_json::from_str("\"something_else\"").unwrap();
        assert_eq!(reason, FinishReason::Unknown);
    }
}

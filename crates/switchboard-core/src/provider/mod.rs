//! Provider adapters
//!
//! Every backend vendor sits behind [`ProviderAdapter`], which exposes the
//! same request/response shape regardless of the vendor's wire format.
//! How an adapter authenticates is its own business.

mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{FinishReason, TokenUsage};

pub use openai::{OpenAiCompatibleAdapter, OpenAiCompatibleAdapterBuilder};

/// Failure reported by a provider adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Vendor returned HTTP {status}: {message}")]
    Vendor { status: u16, message: String },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Rate limited{}", .retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying on a sibling provider
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Vendor { .. }
            | Self::Timeout(_)
            | Self::RateLimited { .. }
            | Self::InvalidResponse(_) => true,
        }
    }
}

/// Completion request handed to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub request_id: String,
    pub model: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Completion produced by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub text: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    /// Cost reported by the vendor; derived from the pricing table when absent
    pub cost_usd: Option<f64>,
}

/// Embedding request handed to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    pub request_id: String,
    pub model: String,
    pub input: String,
}

/// Embedding produced by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingReply {
    pub embedding: Vec<f32>,
    pub usage: TokenUsage,
    pub cost_usd: Option<f64>,
}

/// Uniform interface to one backend vendor
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier this adapter serves (e.g., "openai")
    fn provider_id(&self) -> &str;

    /// Generate a text completion
    async fn generate_completion(&self, params: CompletionParams) -> Result<CompletionReply, ProviderError>;

    /// Generate an embedding vector
    async fn generate_embedding(&self, params: EmbeddingParams) -> Result<EmbeddingReply, ProviderError>;
}

/// Shared adapter handle
pub type SharedProviderAdapter = Arc<dyn ProviderAdapter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_provider_error_is_retryable() {
        let errors = [
            ProviderError::Network("connection reset".to_string()),
            ProviderError::Vendor {
                status: 503,
                message: "overloaded".to_string(),
            },
            ProviderError::Timeout(30_000),
            ProviderError::RateLimited { retry_after_secs: None },
            ProviderError::InvalidResponse("empty choices".to_string()),
        ];
        assert!(errors.iter().all(ProviderError::is_retryable));
    }

    #[test]
    fn test_rate_limited_message() {
        let with_hint = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(with_hint.to_string(), "Rate limited, retry after 30s");

        let without = ProviderError::RateLimited { retry_after_secs: None };
        assert_eq!(without.to_string(), "Rate limited");
    }

    #[test]
    fn test_timeout_message_names_duration() {
        assert!(ProviderError::Timeout(1500).to_string().contains("1500ms"));
    }
}

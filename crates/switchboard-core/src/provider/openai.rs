//! Adapter for OpenAI-compatible HTTP APIs
//!
//! Speaks the `/chat/completions` and `/embeddings` endpoints shared by
//! OpenAI and the many gateways that mirror its API. The caller provides
//! the base URL and API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CompletionParams, CompletionReply, EmbeddingParams, EmbeddingReply, ProviderAdapter, ProviderError,
};
use crate::error::{Error, Result};
use crate::task::{FinishReason, TokenUsage};

/// Default API base URL
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default HTTP timeout
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatRequest {
    fn from_params(params: &CompletionParams) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &params.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: params.prompt.clone(),
        });

        Self {
            model: params.model.clone(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Option<WireUsage>,
}

fn completion_from_response(response: ChatResponse) -> std::result::Result<CompletionReply, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("Empty choices in response".to_string()))?;

    Ok(CompletionReply {
        text: choice.message.content.unwrap_or_default(),
        usage: response.usage.map(TokenUsage::from).unwrap_or_default(),
        finish_reason: FinishReason::from_vendor(choice.finish_reason.as_deref()),
        cost_usd: None,
    })
}

fn embedding_from_response(response: EmbeddingResponse) -> std::result::Result<EmbeddingReply, ProviderError> {
    let data = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("Empty embedding response".to_string()))?;

    Ok(EmbeddingReply {
        embedding: data.embedding,
        usage: response.usage.map(TokenUsage::from).unwrap_or_default(),
        cost_usd: None,
    })
}

/// Map a non-success HTTP status and body to a provider error
fn error_from_status(status: u16, body: &str) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: extract_retry_after(body),
        },
        _ => ProviderError::Vendor {
            status,
            message: body.to_string(),
        },
    }
}

/// Extract a retry-after hint from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            json.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|v| v.as_u64())
        })
}

/// Adapter for an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAiCompatibleAdapter {
    http_client: HttpClient,
    provider_id: String,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl std::fmt::Debug for OpenAiCompatibleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleAdapter")
            .field("provider_id", &self.provider_id)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Builder for [`OpenAiCompatibleAdapter`]
#[derive(Debug, Default)]
pub struct OpenAiCompatibleAdapterBuilder {
    provider_id: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl OpenAiCompatibleAdapterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider identifier reported by the adapter (defaults to "openai")
    pub fn provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the OpenAI API)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleAdapter> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::ConfigError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(OpenAiCompatibleAdapter {
            http_client,
            provider_id: self.provider_id.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url,
            timeout_ms: timeout_secs * 1000,
        })
    }
}

impl OpenAiCompatibleAdapter {
    pub fn builder() -> OpenAiCompatibleAdapterBuilder {
        OpenAiCompatibleAdapterBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout_ms)
        } else {
            ProviderError::Network(error.to_string())
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn generate_completion(
        &self,
        params: CompletionParams,
    ) -> std::result::Result<CompletionReply, ProviderError> {
        debug!(
            provider = %self.provider_id,
            model = %params.model,
            request_id = %params.request_id,
            "Sending chat completion request"
        );

        let request = ChatRequest::from_params(&params);
        let response: ChatResponse = self.post("/chat/completions", &request).await?;
        completion_from_response(response)
    }

    async fn generate_embedding(
        &self,
        params: EmbeddingParams,
    ) -> std::result::Result<EmbeddingReply, ProviderError> {
        debug!(
            provider = %self.provider_id,
            model = %params.model,
            request_id = %params.request_id,
            "Sending embedding request"
        );

        let request = EmbeddingRequest {
            model: &params.model,
            input: &params.input,
        };
        let response: EmbeddingResponse = self.post("/embeddings", &request).await?;
        embedding_from_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_api_key() {
        assert!(OpenAiCompatibleAdapter::builder().build().is_err());
        assert!(OpenAiCompatibleAdapter::builder().api_key("  ").build().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let adapter = OpenAiCompatibleAdapter::builder()
            .api_key("test-key")
            .base_url("https://gateway.example.com/v1/")
            .build()
            .unwrap();

        assert_eq!(adapter.provider_id(), "openai");
        assert_eq!(adapter.base_url(), "https://gateway.example.com/v1");

        let debug = format!("{:?}", adapter);
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn test_chat_request_includes_system_prompt() {
        let params = CompletionParams {
            request_id: "req-1".to_string(),
            model: "gpt-4o".to_string(),
            prompt: "Hello".to_string(),
            system_prompt: Some("Be brief".to_string()),
            max_tokens: Some(64),
            temperature: None,
        };

        let json = serde_json::to_value(ChatRequest::from_params(&params)).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["max_tokens"], 64);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_completion_from_response() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let reply = completion_from_response(response).unwrap();

        assert_eq!(reply.text, "Hi there");
        assert_eq!(reply.usage, TokenUsage::new(9, 3));
        assert_eq!(reply.finish_reason, FinishReason::Stop);
        assert!(reply.cost_usd.is_none());
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            completion_from_response(response),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_embedding_from_response() {
        let json = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 5, "total_tokens": 5}
        }"#;

        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let reply = embedding_from_response(response).unwrap();

        assert_eq!(reply.embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(reply.usage.prompt_tokens, 5);
        assert_eq!(reply.usage.completion_tokens, 0);
    }

    #[test]
    fn test_error_from_status() {
        assert_eq!(
            error_from_status(429, r#"{"error": {"retry_after": 60}}"#),
            ProviderError::RateLimited {
                retry_after_secs: Some(60)
            }
        );
        assert_eq!(
            error_from_status(503, "overloaded"),
            ProviderError::Vendor {
                status: 503,
                message: "overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(extract_retry_after(r#"{"message": "slow down"}"#), None);
        assert_eq!(extract_retry_after("not json"), None);
    }
}

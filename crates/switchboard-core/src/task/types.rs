//! Request-side types: task types, task requests and candidates

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of work a task request asks a provider to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Free-form text generation
    Generation,
    /// Conversational reply
    Chat,
    /// Vector embedding of the input
    Embedding,
    /// Code generation or editing
    Code,
    /// Multi-step reasoning
    Reasoning,
    /// Label assignment
    Classification,
    /// Condensing input text
    Summarization,
    /// Translating between languages
    Translation,
    /// Question answering
    Qa,
    /// Authoring system prompts
    SystemPrompt,
}

impl TaskType {
    /// Every task type, in declaration order
    pub fn all() -> &'static [TaskType] {
        &[
            Self::Generation,
            Self::Chat,
            Self::Embedding,
            Self::Code,
            Self::Reasoning,
            Self::Classification,
            Self::Summarization,
            Self::Translation,
            Self::Qa,
            Self::SystemPrompt,
        ]
    }

    /// Static capability requirements used when the request declares none
    pub fn default_capabilities(&self) -> Vec<String> {
        let caps: &[&str] = match self {
            Self::Generation => &["text-generation"],
            Self::Chat => &["chat"],
            Self::Embedding => &["embeddings"],
            Self::Code => &["code"],
            Self::Reasoning => &["reasoning"],
            Self::Classification => &["classification"],
            Self::Summarization => &["summarization"],
            Self::Translation => &["translation"],
            Self::Qa => &["qa"],
            Self::SystemPrompt => &["text-generation"],
        };
        caps.iter().map(|c| c.to_string()).collect()
    }

    /// Whether this task is served by the embedding endpoint
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Chat => write!(f, "chat"),
            Self::Embedding => write!(f, "embedding"),
            Self::Code => write!(f, "code"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Classification => write!(f, "classification"),
            Self::Summarization => write!(f, "summarization"),
            Self::Translation => write!(f, "translation"),
            Self::Qa => write!(f, "qa"),
            Self::SystemPrompt => write!(f, "system_prompt"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generation" => Ok(Self::Generation),
            "chat" => Ok(Self::Chat),
            "embedding" => Ok(Self::Embedding),
            "code" => Ok(Self::Code),
            "reasoning" => Ok(Self::Reasoning),
            "classification" => Ok(Self::Classification),
            "summarization" => Ok(Self::Summarization),
            "translation" => Ok(Self::Translation),
            "qa" => Ok(Self::Qa),
            "system_prompt" | "system-prompt" => Ok(Self::SystemPrompt),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// A (provider, model) pair eligible to serve a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider identifier (e.g., "openai")
    pub provider: String,
    /// Model identifier within the provider (e.g., "gpt-4o")
    pub model: String,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// A unit of work to be satisfied by one of the registered providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Unique per call; used for logging, never for deduplication
    pub request_id: String,
    /// Kind of work requested
    pub task_type: TaskType,
    /// Prompt or input text
    pub prompt: String,
    /// System prompt; a task-type default is injected when absent
    pub system_prompt: Option<String>,
    /// Capabilities the serving model must have
    pub required_capabilities: Option<BTreeSet<String>>,
    /// Explicit provider override
    pub preferred_provider: Option<String>,
    /// Explicit model override (used together with `preferred_provider`)
    pub preferred_model: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Caller-estimated complexity (0.0 to 1.0), used for latency prediction
    pub complexity: Option<f64>,
}

impl TaskRequest {
    /// Create a new task request with a generated request id
    pub fn new(task_type: TaskType, prompt: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            task_type,
            prompt: prompt.into(),
            system_prompt: None,
            required_capabilities: None,
            preferred_provider: None,
            preferred_model: None,
            max_tokens: None,
            temperature: None,
            complexity: None,
        }
    }

    /// Use a caller-supplied request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Declare required capabilities
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Pin a provider (and optionally a model)
    pub fn with_preferred(mut self, provider: impl Into<String>, model: Option<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self.preferred_model = model;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the complexity estimate
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = Some(complexity.clamp(0.0, 1.0));
        self
    }

    /// The explicitly pinned candidate, if both provider and model are set
    pub fn pinned_candidate(&self) -> Option<Candidate> {
        match (&self.preferred_provider, &self.preferred_model) {
            (Some(provider), Some(model)) => Some(Candidate::new(provider.clone(), model.clone())),
            _ => None,
        }
    }

    /// Capabilities used to query the registry
    pub fn capabilities(&self) -> Vec<String> {
        match &self.required_capabilities {
            Some(caps) if !caps.is_empty() => caps.iter().cloned().collect(),
            _ => self.task_type.default_capabilities(),
        }
    }

    /// Prompt length in token-equivalents (4 characters per token)
    pub fn prompt_tokens_estimate(&self) -> usize {
        self.prompt.chars().count().div_ceil(4)
    }
}

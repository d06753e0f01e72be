//! Capability registry
//!
//! Maps capability requirements to the candidates able to serve them. The
//! orchestrator only needs [`CapabilityRegistry`]; [`StaticCapabilityRegistry`]
//! is an in-memory implementation seeded with common models.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::task::Candidate;

/// Source of candidates for a set of required capabilities
pub trait CapabilityRegistry: Send + Sync {
    /// Candidates offering every capability in `capabilities`
    ///
    /// Returns an empty vec when nothing matches. Order is significant:
    /// ties during selection go to earlier candidates.
    fn find_models_by_capabilities(&self, capabilities: &[String]) -> Vec<Candidate>;
}

/// Shared registry handle
pub type SharedCapabilityRegistry = Arc<dyn CapabilityRegistry>;

#[derive(Debug, Clone)]
struct RegisteredModel {
    candidate: Candidate,
    capabilities: BTreeSet<String>,
}

/// In-memory registry preserving registration order
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilityRegistry {
    models: Vec<RegisteredModel>,
}

impl StaticCapabilityRegistry {
    /// Registry with no models
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the commonly deployed models of the four default providers
    pub fn with_defaults() -> Self {
        const TEXT: &[&str] = &[
            "text-generation",
            "chat",
            "code",
            "reasoning",
            "classification",
            "summarization",
            "translation",
            "qa",
        ];
        const LIGHT: &[&str] = &[
            "text-generation",
            "chat",
            "classification",
            "summarization",
            "translation",
            "qa",
        ];
        const EMBED: &[&str] = &["embeddings"];

        Self::new()
            .with_model("openai", "gpt-4o", TEXT.iter().copied().chain(["vision"]))
            .with_model("openai", "gpt-4o-mini", LIGHT.iter().copied().chain(["code"]))
            .with_model("openai", "text-embedding-3-small", EMBED.iter().copied())
            .with_model("anthropic", "claude-sonnet-4", TEXT.iter().copied().chain(["vision"]))
            .with_model("anthropic", "claude-3-5-haiku", LIGHT.iter().copied())
            .with_model("google", "gemini-2.0-flash", TEXT.iter().copied().chain(["vision"]))
            .with_model("google", "text-embedding-004", EMBED.iter().copied())
            .with_model("mistral", "mistral-large", TEXT.iter().copied())
            .with_model("mistral", "mistral-small", LIGHT.iter().copied())
            .with_model("mistral", "mistral-embed", EMBED.iter().copied())
    }

    /// Register a model, replacing the capabilities of an existing registration
    pub fn register<I, S>(&mut self, candidate: Candidate, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capabilities: BTreeSet<String> = capabilities.into_iter().map(Into::into).collect();
        match self.models.iter_mut().find(|m| m.candidate == candidate) {
            Some(existing) => existing.capabilities = capabilities,
            None => self.models.push(RegisteredModel {
                candidate,
                capabilities,
            }),
        }
    }

    /// Builder-style registration
    pub fn with_model<I, S>(mut self, provider: &str, model: &str, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(Candidate::new(provider, model), capabilities);
        self
    }

    /// Every registered candidate, in registration order
    pub fn candidates(&self) -> Vec<Candidate> {
        self.models.iter().map(|m| m.candidate.clone()).collect()
    }

    /// Candidates registered under `provider`
    pub fn candidates_for_provider(&self, provider: &str) -> Vec<Candidate> {
        self.models
            .iter()
            .filter(|m| m.candidate.provider == provider)
            .map(|m| m.candidate.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl CapabilityRegistry for StaticCapabilityRegistry {
    fn find_models_by_capabilities(&self, capabilities: &[String]) -> Vec<Candidate> {
        self.models
            .iter()
            .filter(|m| capabilities.iter().all(|c| m.capabilities.contains(c)))
            .map(|m| m.candidate.clone())
            .collect()
    }
}

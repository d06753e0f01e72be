//! Error types for Switchboard

use thiserror::Error;

use crate::provider::ProviderError;
use crate::task::Candidate;

/// Result type alias using Switchboard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Switchboard error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Selection errors (E100-E199)
    #[error("No eligible candidates for task type '{0}'. Register a model with the required capabilities.")]
    NoEligibleCandidates(String),

    #[error("Circuit open for every eligible candidate: {}", format_candidates(.0))]
    CircuitOpen(Vec<Candidate>),

    // Provider errors (E200-E299)
    #[error("Provider '{provider}' failed serving model '{model}': {source}")]
    AdapterFailure {
        provider: String,
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error("No adapter registered for provider '{0}'")]
    ProviderNotRegistered(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

fn format_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Wrap a provider error with the candidate that produced it
    pub fn adapter_failure(candidate: &Candidate, source: ProviderError) -> Self {
        Self::AdapterFailure {
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            source,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEligibleCandidates(_) => "E100",
            Self::CircuitOpen(_) => "E101",
            Self::AdapterFailure { .. } => "E200",
            Self::ProviderNotRegistered(_) => "E201",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) => "E9999",
        }
    }

    /// Whether the fallback protocol may retry this failure on a sibling provider
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AdapterFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The (provider, model) pair an adapter failure originated from
    pub fn origin(&self) -> Option<Candidate> {
        match self {
            Self::AdapterFailure {
                provider, model, ..
            } => Some(Candidate::new(provider.clone(), model.clone())),
            _ => None,
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NoEligibleCandidates(_) => {
                Some("Check the capability registry for the task's required capabilities".to_string())
            }
            Self::CircuitOpen(_) => Some("Retry after the circuit reset timeout".to_string()),
            Self::ProviderNotRegistered(provider) => {
                Some(format!("Register an adapter for provider '{}'", provider))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_eligible_candidates_error() {
        let error = Error::NoEligibleCandidates("chat".to_string());
        assert_eq!(error.code(), "E100");
        assert!(error.to_string().contains("chat"));
        assert!(error.suggestion().is_some());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_circuit_open_lists_candidates() {
        let error = Error::CircuitOpen(vec![
            Candidate::new("openai", "gpt-4o"),
            Candidate::new("anthropic", "claude-3-5-haiku"),
        ]);
        assert_eq!(error.code(), "E101");
        let message = error.to_string();
        assert!(message.contains("openai/gpt-4o"));
        assert!(message.contains("anthropic/claude-3-5-haiku"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_adapter_failure_keeps_cause_chain() {
        let candidate = Candidate::new("openai", "gpt-4o");
        let error = Error::adapter_failure(&candidate, ProviderError::Timeout(1500));

        assert_eq!(error.code(), "E200");
        assert!(error.is_retryable());
        assert_eq!(error.origin(), Some(candidate));

        let source = std::error::Error::source(&error).expect("cause should be preserved");
        assert!(source.to_string().contains("1500"));
    }

    #[test]
    fn test_all_error_codes_unique() {
        let errors = vec![
            Error::NoEligibleCandidates("test".to_string()).code(),
            Error::CircuitOpen(Vec::new()).code(),
            Error::adapter_failure(
                &Candidate::new("p", "m"),
                ProviderError::Network("down".to_string()),
            )
            .code(),
            Error::ProviderNotRegistered("test".to_string()).code(),
            Error::ConfigError("test".to_string()).code(),
            Error::InvalidInput("test".to_string()).code(),
            Error::Other("test".to_string()).code(),
        ];

        let unique_codes: std::collections::HashSet<_> = errors.into_iter().collect();
        assert_eq!(unique_codes.len(), 7);
    }
}

//! Per-call execution options

use std::time::Duration;

use crate::config::OrchestratorConfig;
use crate::routing::Strategy;

/// Overrides for a single `execute_task` call
///
/// Unset fields fall back to the orchestrator's configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub strategy: Option<Strategy>,
    pub enable_caching: Option<bool>,
    pub enable_fallback: Option<bool>,
    pub max_fallback_depth: Option<u32>,
    pub timeout: Option<Duration>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.enable_caching = Some(enabled);
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = Some(enabled);
        self
    }

    pub fn with_max_fallback_depth(mut self, depth: u32) -> Self {
        self.max_fallback_depth = Some(depth);
        self
    }

    /// Bound each adapter call; an overrun counts as a failed attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn resolve(&self, config: &OrchestratorConfig) -> ResolvedOptions {
        ResolvedOptions {
            strategy: self.strategy.unwrap_or(config.strategy),
            enable_caching: self.enable_caching.unwrap_or(config.enable_caching),
            enable_fallback: self.enable_fallback.unwrap_or(config.enable_fallback),
            max_fallback_depth: self.max_fallback_depth.unwrap_or(config.max_fallback_depth),
            timeout: self
                .timeout
                .or_else(|| config.request_timeout_ms.map(Duration::from_millis)),
        }
    }
}

/// Options with every field decided
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedOptions {
    pub strategy: Strategy,
    pub enable_caching: bool,
    pub enable_fallback: bool,
    pub max_fallback_depth: u32,
    pub timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_use_config() {
        let config = OrchestratorConfig {
            request_timeout_ms: Some(2_500),
            ..OrchestratorConfig::default()
        };
        let resolved = ExecuteOptions::new().resolve(&config);

        assert_eq!(resolved.strategy, Strategy::Balanced);
        assert!(resolved.enable_caching);
        assert!(resolved.enable_fallback);
        assert_eq!(resolved.max_fallback_depth, 2);
        assert_eq!(resolved.timeout, Some(Duration::from_millis(2_500)));
    }

    #[test]
    fn test_overrides_win() {
        let resolved = ExecuteOptions::new()
            .with_strategy(Strategy::CostOptimized)
            .with_caching(false)
            .with_fallback(false)
            .with_max_fallback_depth(5)
            .with_timeout(Duration::from_secs(1))
            .resolve(&OrchestratorConfig::default());

        assert_eq!(resolved.strategy, Strategy::CostOptimized);
        assert!(!resolved.enable_caching);
        assert!(!resolved.enable_fallback);
        assert_eq!(resolved.max_fallback_depth, 5);
        assert_eq!(resolved.timeout, Some(Duration::from_secs(1)));
    }
}

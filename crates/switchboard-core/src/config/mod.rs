//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::routing::{Strategy, StrategyWeights};
use crate::task::TaskType;

/// Switchboard orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Default selection strategy
    pub strategy: Strategy,
    /// Cache entry lifetime in milliseconds
    pub cache_ttl_ms: u64,
    /// Serve repeated requests from the response cache
    pub enable_caching: bool,
    /// Try sibling providers after an adapter failure
    pub enable_fallback: bool,
    /// Maximum number of sibling attempts per call
    pub max_fallback_depth: u32,
    /// Provider call timeout in milliseconds (None = adapter default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Interval between background maintenance passes
    pub maintenance_interval_secs: u64,
    pub circuit_breaker: CircuitBreakerConfig,
    pub routing: RoutingConfig,
    pub predictor: PredictorConfig,
    pub tracker: TrackerConfig,
    /// Ordered sibling providers per primary provider
    pub fallback_chains: BTreeMap<String, Vec<String>>,
    /// Static routing rules, first match wins
    pub routing_rules: Vec<RoutingRule>,
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed
    pub reset_timeout_ms: u64,
    /// Successful probes needed to close the circuit
    pub successes_to_close: u32,
}

/// Routing optimizer constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// EMA learning rate applied to routing scores
    pub learning_rate: f64,
    /// Exploration rate before any adjustment
    pub initial_exploration_rate: f64,
    /// Lower bound for the exploration rate
    pub min_exploration_rate: f64,
    /// Exploration rate the decay formula starts from
    pub exploration_decay_start: f64,
    /// Total decay applied over `exploration_decay_samples`
    pub exploration_decay_span: f64,
    /// Sample count over which the decay span is applied
    pub exploration_decay_samples: f64,
    /// Weight of the stored score in the combined score
    pub historical_weight: f64,
    /// Weight of the predicted score in the combined score
    pub predicted_weight: f64,
    /// Latency at which the latency score reaches zero
    pub latency_ceiling_ms: f64,
    /// Cost at which the cost score reaches zero
    pub cost_ceiling_usd: f64,
    /// Reward weights: success, latency, cost
    pub reward_weights: [f64; 3],
    /// Per-step pull of scores toward the neutral prior during maintenance
    pub score_decay_rate: f64,
    /// Predicted-score weights per strategy
    pub strategy_weights: StrategyWeights,
}

/// Performance predictor constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Latency ring buffer capacity per candidate
    pub latency_window: usize,
    /// Most recent samples used for the baseline latency
    pub baseline_samples: usize,
    /// Training samples kept after `train()`
    pub max_history: usize,
    /// Prompt length (token-equivalents) above which latency is inflated
    pub long_prompt_tokens: usize,
    /// Complexity above which latency is inflated
    pub complexity_threshold: f64,
    /// UTC hours considered peak
    pub peak_hours: Vec<u32>,
    /// UTC hours considered high peak (subset of peak hours)
    pub high_peak_hours: Vec<u32>,
    /// Latency multiplier for prompts over `long_prompt_tokens`
    pub long_prompt_factor: f64,
    /// Latency multiplier for complexity over `complexity_threshold`
    pub high_complexity_factor: f64,
    /// Latency multiplier during peak hours
    pub peak_factor: f64,
    /// Latency multiplier during high-peak hours (replaces `peak_factor`)
    pub high_peak_factor: f64,
}

/// Business value tracker constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Execution samples kept in the sliding window
    pub window_size: usize,
    /// Response time at or under which a request meets its SLA
    pub sla_threshold_ms: u64,
}

/// Static routing rule that pins a provider/model for matching requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Match only this task type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    /// Match only prompts containing this substring (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_contains: Option<String>,
    /// Provider to pin
    pub provider: String,
    /// Model to pin
    pub model: String,
}

impl RoutingRule {
    /// Whether this rule applies to a request
    pub fn matches(&self, task_type: TaskType, prompt: &str) -> bool {
        if self.task_type.is_none() && self.prompt_contains.is_none() {
            return false;
        }
        if let Some(expected) = self.task_type {
            if expected != task_type {
                return false;
            }
        }
        if let Some(needle) = &self.prompt_contains {
            if !prompt.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Balanced,
            cache_ttl_ms: 300_000,
            enable_caching: true,
            enable_fallback: true,
            max_fallback_depth: 2,
            request_timeout_ms: None,
            maintenance_interval_secs: 60,
            circuit_breaker: CircuitBreakerConfig::default(),
            routing: RoutingConfig::default(),
            predictor: PredictorConfig::default(),
            tracker: TrackerConfig::default(),
            fallback_chains: default_fallback_chains(),
            routing_rules: Vec::new(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            successes_to_close: 2,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            initial_exploration_rate: 0.2,
            min_exploration_rate: 0.05,
            exploration_decay_start: 0.3,
            exploration_decay_span: 0.25,
            exploration_decay_samples: 10_000.0,
            historical_weight: 0.7,
            predicted_weight: 0.3,
            latency_ceiling_ms: 5_000.0,
            cost_ceiling_usd: 0.10,
            reward_weights: [0.6, 0.2, 0.2],
            score_decay_rate: 0.01,
            strategy_weights: StrategyWeights::default(),
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            latency_window: 100,
            baseline_samples: 20,
            max_history: 1_000,
            long_prompt_tokens: 1_000,
            complexity_threshold: 0.7,
            peak_hours: (9..=17).collect(),
            high_peak_hours: (12..=14).collect(),
            long_prompt_factor: 1.2,
            high_complexity_factor: 1.3,
            peak_factor: 1.10,
            high_peak_factor: 1.15,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_size: 1_000,
            sla_threshold_ms: 2_000,
        }
    }
}

/// Sibling providers tried, in order, when a primary provider fails
pub fn default_fallback_chains() -> BTreeMap<String, Vec<String>> {
    fn chain(siblings: &[&str]) -> Vec<String> {
        siblings.iter().map(|s| s.to_string()).collect()
    }

    let mut chains = BTreeMap::new();
    chains.insert("openai".to_string(), chain(&["anthropic", "google", "mistral"]));
    chains.insert("anthropic".to_string(), chain(&["openai", "google", "mistral"]));
    chains.insert("google".to_string(), chain(&["openai", "anthropic", "mistral"]));
    chains.insert("mistral".to_string(), chain(&["openai", "anthropic", "google"]));
    chains
}

impl OrchestratorConfig {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("SWITCHBOARD_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("switchboard")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: OrchestratorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 {
            return Err(anyhow!("circuit_breaker.failure_threshold must be at least 1"));
        }
        if cb.successes_to_close == 0 {
            return Err(anyhow!("circuit_breaker.successes_to_close must be at least 1"));
        }

        let routing = &self.routing;
        if !(0.0..=1.0).contains(&routing.learning_rate) {
            return Err(anyhow!("routing.learning_rate must be between 0.0 and 1.0"));
        }
        for (name, rate) in [
            ("routing.initial_exploration_rate", routing.initial_exploration_rate),
            ("routing.min_exploration_rate", routing.min_exploration_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(anyhow!("{} must be between 0.0 and 1.0", name));
            }
        }
        if routing.latency_ceiling_ms <= 0.0 || routing.cost_ceiling_usd <= 0.0 {
            return Err(anyhow!("routing latency and cost ceilings must be positive"));
        }
        if routing.exploration_decay_samples <= 0.0 {
            return Err(anyhow!("routing.exploration_decay_samples must be positive"));
        }
        for (strategy, weights) in routing.strategy_weights.entries() {
            let parts = [weights.reliability, weights.latency, weights.cost];
            if parts.iter().any(|w| !(0.0..=1.0).contains(w)) || (weights.total() - 1.0).abs() > 1e-6 {
                return Err(anyhow!(
                    "routing.strategy_weights.{} must be within 0.0..=1.0 and sum to 1.0",
                    strategy
                ));
            }
        }

        let predictor = &self.predictor;
        if predictor.latency_window == 0 || predictor.baseline_samples == 0 {
            return Err(anyhow!("predictor windows must be non-empty"));
        }
        if predictor.peak_hours.iter().chain(&predictor.high_peak_hours).any(|h| *h > 23) {
            return Err(anyhow!("predictor peak hours must be within 0..=23"));
        }
        for (name, factor) in [
            ("predictor.long_prompt_factor", predictor.long_prompt_factor),
            ("predictor.high_complexity_factor", predictor.high_complexity_factor),
            ("predictor.peak_factor", predictor.peak_factor),
            ("predictor.high_peak_factor", predictor.high_peak_factor),
        ] {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(anyhow!("{} must be positive", name));
            }
        }

        if self.tracker.window_size == 0 {
            return Err(anyhow!("tracker.window_size must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OrchestratorConfig::default();

        assert_eq!(config.strategy, Strategy::Balanced);
        assert!(config.enable_caching);
        assert!(config.enable_fallback);
        assert_eq!(config.max_fallback_depth, 2);

        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker.successes_to_close, 2);

        assert_eq!(config.routing.learning_rate, 0.1);
        assert_eq!(config.routing.initial_exploration_rate, 0.2);
        assert_eq!(config.predictor.latency_window, 100);
        assert_eq!(config.tracker.window_size, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            strategy = "cost_optimized"
            max_fallback_depth = 1

            [circuit_breaker]
            failure_threshold = 3

            [[routing_rules]]
            task_type = "code"
            provider = "openai"
            model = "gpt-4o"
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, Strategy::CostOptimized);
        assert_eq!(config.max_fallback_depth, 1);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.successes_to_close, 2);
        assert_eq!(config.routing_rules.len(), 1);
        assert_eq!(config.fallback_chains, default_fallback_chains());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = OrchestratorConfig::from_toml_str(
            r#"
            [circuit_breaker]
            failure_threshold = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));

        let err = OrchestratorConfig::from_toml_str(
            r#"
            [routing]
            learning_rate = 1.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("learning_rate"));
    }

    #[test]
    fn test_strategy_weights_override() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [routing.strategy_weights.balanced]
            reliability = 0.8
            latency = 0.1
            cost = 0.1

            [predictor]
            peak_factor = 1.5
            "#,
        )
        .unwrap();

        let weights = &config.routing.strategy_weights;
        assert_eq!(weights.balanced.reliability, 0.8);
        assert_eq!(weights.cost_optimized, StrategyWeights::default().cost_optimized);
        assert_eq!(config.predictor.peak_factor, 1.5);
        assert_eq!(config.predictor.high_peak_factor, 1.15);
    }

    #[test]
    fn test_strategy_weights_must_sum_to_one() {
        let err = OrchestratorConfig::from_toml_str(
            r#"
            [routing.strategy_weights.cost_optimized]
            reliability = 0.5
            latency = 0.5
            cost = 0.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("strategy_weights.cost_optimized"));

        let err = OrchestratorConfig::from_toml_str(
            r#"
            [predictor]
            high_complexity_factor = 0.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("high_complexity_factor"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = OrchestratorConfig::default();
        config.cache_ttl_ms = 42_000;
        config.save_to(&path).unwrap();

        let loaded = OrchestratorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache_ttl_ms, 42_000);
        assert_eq!(loaded.fallback_chains, config.fallback_chains);
    }

    #[test]
    fn test_routing_rule_matching() {
        let rule = RoutingRule {
            task_type: Some(TaskType::Code),
            prompt_contains: Some("Rust".to_string()),
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
        };

        assert!(rule.matches(TaskType::Code, "write some rust please"));
        assert!(!rule.matches(TaskType::Chat, "write some rust please"));
        assert!(!rule.matches(TaskType::Code, "write some go"));

        let empty = RoutingRule {
            task_type: None,
            prompt_contains: None,
            provider: "x".to_string(),
            model: "y".to_string(),
        };
        assert!(!empty.matches(TaskType::Chat, "anything"));
    }
}

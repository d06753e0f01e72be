//! Orchestrator construction

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::executor::Orchestrator;
use crate::cache::ResponseCache;
use crate::clock::{SharedClock, system_clock};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::metrics::{SharedMetricsSink, TracingMetricsSink};
use crate::prediction::PerformancePredictor;
use crate::pricing::PricingTable;
use crate::provider::SharedProviderAdapter;
use crate::registry::{SharedCapabilityRegistry, StaticCapabilityRegistry};
use crate::resilience::CircuitBreakerBank;
use crate::routing::RoutingOptimizer;
use crate::tracker::BusinessValueTracker;

/// Builder for [`Orchestrator`]
///
/// Defaults: configuration from [`OrchestratorConfig::default`], the
/// built-in capability registry, a tracing metrics sink, wall-clock time
/// and an entropy-seeded optimizer.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<OrchestratorConfig>,
    adapters: HashMap<String, SharedProviderAdapter>,
    registry: Option<SharedCapabilityRegistry>,
    metrics: Option<SharedMetricsSink>,
    clock: Option<SharedClock>,
    pricing: Option<PricingTable>,
    seed: Option<u64>,
    fixed_exploration_rate: Option<f64>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an adapter under its `provider_id`, replacing any previous one
    pub fn adapter(mut self, adapter: SharedProviderAdapter) -> Self {
        self.adapters.insert(adapter.provider_id().to_string(), adapter);
        self
    }

    pub fn registry(mut self, registry: SharedCapabilityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn metrics_sink(mut self, sink: SharedMetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Time source for circuit breakers, the cache and the predictor
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Seed the optimizer's RNG (for reproducibility in tests)
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Pin the exploration rate instead of letting maintenance decay it
    pub fn fixed_exploration_rate(mut self, rate: f64) -> Self {
        self.fixed_exploration_rate = Some(rate);
        self
    }

    /// Validate the configuration and build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let clock = self.clock.unwrap_or_else(system_clock);

        let optimizer = match self.seed {
            Some(seed) => RoutingOptimizer::with_seed(config.routing.clone(), seed),
            None => RoutingOptimizer::new(config.routing.clone()),
        };
        let optimizer = match self.fixed_exploration_rate {
            Some(rate) => optimizer.with_fixed_exploration_rate(rate),
            None => optimizer,
        };

        debug!(
            adapters = self.adapters.len(),
            strategy = %config.strategy,
            "Building orchestrator"
        );

        Ok(Orchestrator {
            breakers: CircuitBreakerBank::with_clock(config.circuit_breaker.clone(), clock.clone()),
            predictor: PerformancePredictor::with_clock(config.predictor.clone(), clock.clone()),
            tracker: BusinessValueTracker::new(config.tracker.clone()),
            cache: ResponseCache::with_clock(config.cache_ttl_ms, clock),
            optimizer,
            adapters: self.adapters,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(StaticCapabilityRegistry::with_defaults())),
            metrics: self.metrics.unwrap_or_else(|| Arc::new(TracingMetricsSink)),
            pricing: self.pricing.unwrap_or_default(),
            config,
        })
    }
}

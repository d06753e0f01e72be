//! Task execution: cache, selection, circuit gate, dispatch and fallback

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::builder::OrchestratorBuilder;
use super::options::{ExecuteOptions, ResolvedOptions};
use super::preprocess::prepare;
use crate::cache::{ResponseCache, fingerprint};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::metrics::{ExecutionRecord, SharedMetricsSink};
use crate::prediction::{PerformancePredictor, RequestFeatures};
use crate::pricing::PricingTable;
use crate::provider::{
    CompletionParams, CompletionReply, EmbeddingParams, EmbeddingReply, ProviderError, SharedProviderAdapter,
};
use crate::registry::SharedCapabilityRegistry;
use crate::resilience::{CircuitBreakerBank, CircuitSnapshot};
use crate::routing::RoutingOptimizer;
use crate::task::{Candidate, FinishReason, TaskRequest, TaskResponse};
use crate::tracker::{BusinessMetrics, BusinessValueTracker};

/// Outcome of one maintenance pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Exploration rate after adjustment
    pub exploration_rate: f64,
    /// Predictor training samples dropped
    pub samples_dropped: usize,
    /// Expired cache entries removed
    pub cache_entries_purged: usize,
}

enum Reply {
    Completion(CompletionReply),
    Embedding(EmbeddingReply),
}

/// Where an attempt draws its candidates from
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// The request as submitted, honoring any pinned provider/model
    Primary,
    /// Candidates of one fallback sibling provider
    Sibling(&'a str),
}

/// Adaptive model-request orchestrator
///
/// Owns every component and is shared as `Arc<Orchestrator>`; all
/// operations take `&self`.
pub struct Orchestrator {
    pub(super) config: OrchestratorConfig,
    pub(super) adapters: HashMap<String, SharedProviderAdapter>,
    pub(super) registry: SharedCapabilityRegistry,
    pub(super) metrics: SharedMetricsSink,
    pub(super) breakers: CircuitBreakerBank,
    pub(super) predictor: PerformancePredictor,
    pub(super) optimizer: RoutingOptimizer,
    pub(super) tracker: BusinessValueTracker,
    pub(super) cache: ResponseCache,
    pub(super) pricing: PricingTable,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategy", &self.config.strategy)
            .field("providers", &self.registered_providers())
            .field("cached_responses", &self.cache.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Execute a task on the best available candidate
    ///
    /// Serves live cache hits directly. Otherwise selects a candidate,
    /// passes its circuit gate, dispatches, and on a retryable adapter
    /// failure walks the primary provider's fallback chain. When every
    /// sibling fails the primary's error is returned.
    pub async fn execute_task(&self, request: TaskRequest, options: ExecuteOptions) -> Result<TaskResponse> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let opts = options.resolve(&self.config);
        let request = prepare(request, &self.config.routing_rules);

        let key = opts.enable_caching.then(|| fingerprint(&request));
        if let Some(key) = &key
            && let Some(mut cached) = self.cache.get(key)
        {
            debug!(
                request_id = %request.request_id,
                provider = %cached.provider,
                model = %cached.model,
                "Serving response from cache"
            );
            cached.request_id = request.request_id.clone();
            cached.from_cache = true;
            return Ok(cached);
        }

        let result = match self.attempt(&request, &opts, Scope::Primary, 0).await {
            Ok(response) => Ok(response),
            Err(error) if opts.enable_fallback && error.is_retryable() && opts.max_fallback_depth > 0 => {
                self.fallback(&request, &opts, error).await
            }
            Err(error) => Err(error),
        };

        if let (Some(key), Ok(response)) = (key, &result) {
            self.cache.insert(key, response.clone());
        }
        result
    }

    /// Try the primary provider's siblings in order
    async fn fallback(&self, request: &TaskRequest, opts: &ResolvedOptions, original: Error) -> Result<TaskResponse> {
        let Some(origin) = original.origin() else {
            return Err(original);
        };
        let siblings = self
            .config
            .fallback_chains
            .get(&origin.provider)
            .cloned()
            .unwrap_or_default();

        // Only dispatched attempts count toward the depth
        let mut depth = 0;
        for sibling in &siblings {
            if depth >= opts.max_fallback_depth {
                break;
            }
            if *sibling == origin.provider || !self.adapters.contains_key(sibling) {
                debug!(provider = %sibling, "Skipping fallback sibling without adapter");
                continue;
            }

            let next = depth + 1;
            debug!(
                request_id = %request.request_id,
                from = %origin,
                to = %sibling,
                depth = next,
                "Falling back to sibling provider"
            );

            match self.attempt(request, opts, Scope::Sibling(sibling), next).await {
                Ok(response) => {
                    info!(
                        request_id = %request.request_id,
                        provider = %response.provider,
                        model = %response.model,
                        depth = next,
                        "Fallback succeeded"
                    );
                    return Ok(response);
                }
                Err(error @ Error::AdapterFailure { .. }) => {
                    depth = next;
                    warn!(
                        request_id = %request.request_id,
                        provider = %sibling,
                        depth,
                        error = %error,
                        "Fallback attempt failed"
                    );
                }
                Err(error) => {
                    debug!(
                        request_id = %request.request_id,
                        provider = %sibling,
                        error = %error,
                        "Fallback sibling has nothing to dispatch"
                    );
                }
            }
        }

        Err(original)
    }

    /// Select, gate, dispatch and learn from one attempt
    async fn attempt(
        &self,
        request: &TaskRequest,
        opts: &ResolvedOptions,
        scope: Scope<'_>,
        depth: u32,
    ) -> Result<TaskResponse> {
        let candidate = self.select(request, opts, scope)?;
        let adapter = self
            .adapters
            .get(&candidate.provider)
            .cloned()
            .ok_or_else(|| Error::ProviderNotRegistered(candidate.provider.clone()))?;

        let started = Instant::now();
        let outcome = dispatch(&adapter, &candidate, request, opts.timeout).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(reply) => {
                let response = self.normalize(request, &candidate, reply, latency_ms, depth);
                self.learn(request, &candidate, latency_ms, true, response.cost_usd);
                self.tracker.track_cost_savings(request.task_type, response.cost_usd);
                self.emit(request, &candidate, opts, latency_ms, None, depth);
                Ok(response)
            }
            Err(error) => {
                let message = error.to_string();
                self.emit(request, &candidate, opts, latency_ms, Some(message), depth);
                self.learn(request, &candidate, latency_ms, false, 0.0);
                Err(Error::adapter_failure(&candidate, error))
            }
        }
    }

    /// Candidates eligible for `scope`, limited to providers with an adapter
    fn candidates(&self, request: &TaskRequest, scope: Scope<'_>) -> Result<Vec<Candidate>> {
        let mut candidates = self.registry.find_models_by_capabilities(&request.capabilities());

        match scope {
            Scope::Sibling(provider) => candidates.retain(|c| c.provider == provider),
            Scope::Primary => {
                if let Some(provider) = &request.preferred_provider {
                    candidates.retain(|c| &c.provider == provider);
                }
            }
        }
        candidates.retain(|c| self.adapters.contains_key(&c.provider));

        if candidates.is_empty() {
            return Err(Error::NoEligibleCandidates(request.task_type.to_string()));
        }
        Ok(candidates)
    }

    /// Pick a candidate whose circuit admits the request and claim its gate
    fn select(&self, request: &TaskRequest, opts: &ResolvedOptions, scope: Scope<'_>) -> Result<Candidate> {
        if let (Scope::Primary, Some(pinned)) = (scope, request.pinned_candidate()) {
            if !self.adapters.contains_key(&pinned.provider) {
                return Err(Error::ProviderNotRegistered(pinned.provider));
            }
            if !self.breakers.try_acquire(&pinned) {
                return Err(Error::CircuitOpen(vec![pinned]));
            }
            debug!(request_id = %request.request_id, candidate = %pinned, "Dispatching pinned candidate");
            return Ok(pinned);
        }

        let candidates = self.candidates(request, scope)?;
        let features = RequestFeatures::from_request(request);
        let mut available: Vec<Candidate> = candidates
            .iter()
            .filter(|c| self.breakers.is_available(c))
            .cloned()
            .collect();

        // A gate can be taken between the availability check and acquisition;
        // drop that candidate and choose again.
        loop {
            let predictions = self.predictor.predict_performance(&available, &features);
            let Some(decision) =
                self.optimizer
                    .select_optimal_model(&available, &predictions, request.task_type, opts.strategy, true)
            else {
                return Err(Error::CircuitOpen(candidates));
            };

            if self.breakers.try_acquire(&decision.candidate) {
                debug!(
                    request_id = %request.request_id,
                    candidate = %decision.candidate,
                    score = decision.score,
                    exploration = decision.is_exploration(),
                    "Selected candidate"
                );
                return Ok(decision.candidate);
            }
            available.retain(|c| c != &decision.candidate);
        }
    }

    fn normalize(
        &self,
        request: &TaskRequest,
        candidate: &Candidate,
        reply: Reply,
        latency_ms: u64,
        depth: u32,
    ) -> TaskResponse {
        let (text, embedding, usage, finish_reason, reported_cost) = match reply {
            Reply::Completion(reply) => (
                Some(reply.text),
                None,
                reply.usage,
                reply.finish_reason,
                reply.cost_usd,
            ),
            Reply::Embedding(reply) => (None, Some(reply.embedding), reply.usage, FinishReason::Stop, reply.cost_usd),
        };

        TaskResponse {
            request_id: request.request_id.clone(),
            text,
            embedding,
            usage,
            latency_ms,
            model: candidate.model.clone(),
            provider: candidate.provider.clone(),
            finish_reason,
            cost_usd: reported_cost.unwrap_or_else(|| self.pricing.cost_for(&candidate.model, &usage)),
            from_cache: false,
            fallback_depth: depth,
        }
    }

    /// Fold one completed attempt into every learning component
    fn learn(&self, request: &TaskRequest, candidate: &Candidate, latency_ms: u64, success: bool, cost_usd: f64) {
        self.predictor
            .update_model_stats(candidate, latency_ms, success, cost_usd);
        self.optimizer
            .update_from_result(candidate, request.task_type, success, latency_ms, cost_usd);
        if success {
            self.breakers.record_success(candidate);
        } else {
            self.breakers.record_failure(candidate);
        }
        self.tracker.track_execution(latency_ms, success);
    }

    fn emit(
        &self,
        request: &TaskRequest,
        candidate: &Candidate,
        opts: &ResolvedOptions,
        duration_ms: u64,
        error: Option<String>,
        depth: u32,
    ) {
        self.metrics.record(ExecutionRecord {
            request_id: request.request_id.clone(),
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            task_type: request.task_type,
            duration_ms,
            success: error.is_none(),
            strategy: opts.strategy,
            error,
            fallback_depth: depth,
            timestamp: Utc::now(),
        });
    }

    /// Run one maintenance pass
    ///
    /// Adjusts the exploration rate, decays routing scores toward the
    /// prior, trims predictor history and purges expired cache entries.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let exploration_rate = self.optimizer.adjust_exploration_rate();
        self.optimizer
            .decay_scores(self.config.routing.score_decay_rate);
        let samples_dropped = self.predictor.train();
        let cache_entries_purged = self.cache.purge_expired();

        debug!(
            exploration_rate,
            samples_dropped, cache_entries_purged, "Maintenance pass complete"
        );

        MaintenanceReport {
            exploration_rate,
            samples_dropped,
            cache_entries_purged,
        }
    }

    /// Run maintenance every `interval` on the tokio runtime
    ///
    /// The task holds a weak reference and exits once the orchestrator is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let orchestrator = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                orchestrator.run_maintenance();
            }
        })
    }

    /// Interval configured by `maintenance_interval_secs`
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.config.maintenance_interval_secs.max(1))
    }

    /// Providers with a registered adapter, sorted
    pub fn registered_providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = self.adapters.keys().cloned().collect();
        providers.sort();
        providers
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn circuit_breakers(&self) -> &CircuitBreakerBank {
        &self.breakers
    }

    /// Snapshot of every tracked circuit
    pub fn circuit_status(&self) -> Vec<CircuitSnapshot> {
        self.breakers.status()
    }

    pub fn predictor(&self) -> &PerformancePredictor {
        &self.predictor
    }

    pub fn optimizer(&self) -> &RoutingOptimizer {
        &self.optimizer
    }

    pub fn tracker(&self) -> &BusinessValueTracker {
        &self.tracker
    }

    pub fn business_metrics(&self) -> BusinessMetrics {
        self.tracker.metrics()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Call the adapter endpoint matching the task type, bounded by `timeout`
async fn dispatch(
    adapter: &SharedProviderAdapter,
    candidate: &Candidate,
    request: &TaskRequest,
    timeout: Option<Duration>,
) -> std::result::Result<Reply, ProviderError> {
    let call = async {
        if request.task_type.is_embedding() {
            adapter
                .generate_embedding(EmbeddingParams {
                    request_id: request.request_id.clone(),
                    model: candidate.model.clone(),
                    input: request.prompt.clone(),
                })
                .await
                .map(Reply::Embedding)
        } else {
            adapter
                .generate_completion(CompletionParams {
                    request_id: request.request_id.clone(),
                    model: candidate.model.clone(),
                    prompt: request.prompt.clone(),
                    system_prompt: request.system_prompt.clone(),
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                })
                .await
                .map(Reply::Completion)
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout(limit.as_millis() as u64))),
        None => call.await,
    }
}

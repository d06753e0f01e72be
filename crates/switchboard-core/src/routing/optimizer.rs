//! EMA bandit for candidate selection
//!
//! Each (candidate, task type) pair carries a learned score in [0, 1]
//! starting from a neutral 0.5 prior. Observed outcomes pull the score
//! toward a reward built from success, latency and cost. Selection blends
//! that historical score with the predictor's view of the pending request,
//! and with probability `exploration_rate` picks uniformly at random instead.
//!
//! ## Scoring
//!
//! ```text
//! predicted = confidence * (w_r * reliability + w_l * latency_score + w_c * cost_score)
//! combined  = historical_weight * historical + predicted_weight * predicted
//! ```
//!
//! `RoutingConfig::strategy_weights` supplies `w_r`, `w_l` and `w_c` per strategy.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::prelude::*;
use tracing::debug;

use super::types::{RoutingDecision, RoutingReason, Strategy};
use crate::config::RoutingConfig;
use crate::prediction::Prediction;
use crate::task::{Candidate, TaskType};

/// Score assigned to pairs that have never been observed
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug)]
struct Exploration {
    rate: f64,
    pinned: bool,
}

/// Learned routing scores with explicit exploration
#[derive(Debug)]
pub struct RoutingOptimizer {
    config: RoutingConfig,
    scores: DashMap<(Candidate, TaskType), f64>,
    total_samples: AtomicU64,
    exploration: Mutex<Exploration>,
    rng: Mutex<StdRng>,
}

impl Default for RoutingOptimizer {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl RoutingOptimizer {
    /// Create an optimizer seeded from entropy
    pub fn new(config: RoutingConfig) -> Self {
        Self::build(config, StdRng::from_entropy())
    }

    /// Create an optimizer with a fixed seed (for reproducibility in tests)
    pub fn with_seed(config: RoutingConfig, seed: u64) -> Self {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: RoutingConfig, rng: StdRng) -> Self {
        let rate = config.initial_exploration_rate;
        Self {
            config,
            scores: DashMap::new(),
            total_samples: AtomicU64::new(0),
            exploration: Mutex::new(Exploration { rate, pinned: false }),
            rng: Mutex::new(rng),
        }
    }

    /// Pin the exploration rate; `adjust_exploration_rate` leaves it alone afterwards
    pub fn with_fixed_exploration_rate(self, rate: f64) -> Self {
        {
            let mut exploration = self.exploration.lock();
            exploration.rate = rate.clamp(0.0, 1.0);
            exploration.pinned = true;
        }
        self
    }

    /// Select a candidate for `task_type`
    ///
    /// `predictions` are matched to candidates by identity; a candidate
    /// without a prediction is scored with the no-history default.
    /// Returns `None` only when `candidates` is empty.
    pub fn select_optimal_model(
        &self,
        candidates: &[Candidate],
        predictions: &[Prediction],
        task_type: TaskType,
        strategy: Strategy,
        exploration_enabled: bool,
    ) -> Option<RoutingDecision> {
        let first = candidates.first()?;

        if candidates.len() == 1 {
            return Some(RoutingDecision {
                candidate: first.clone(),
                task_type,
                score: 1.0,
                reason: RoutingReason::SingleCandidate,
                alternatives: Vec::new(),
            });
        }

        if exploration_enabled {
            let rate = self.exploration_rate();
            let mut rng = self.rng.lock();
            if rng.r#gen::<f64>() < rate {
                let index = rng.gen_range(0..candidates.len());
                drop(rng);

                let candidate = candidates[index].clone();
                debug!(
                    candidate = %candidate,
                    task_type = %task_type,
                    rate,
                    "Exploration pick"
                );
                return Some(RoutingDecision {
                    score: self.score(&candidate, task_type),
                    alternatives: alternatives(candidates, &candidate),
                    candidate,
                    task_type,
                    reason: RoutingReason::Exploration,
                });
            }
        }

        let mut best: Option<(usize, f64, f64, f64)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let historical = self.score(candidate, task_type);
            let predicted = match predictions.iter().find(|p| &p.candidate == candidate) {
                Some(prediction) => self.predicted_score(prediction, strategy),
                None => self.predicted_score(&Prediction::default_for(candidate.clone()), strategy),
            };
            let combined = self.config.historical_weight * historical + self.config.predicted_weight * predicted;

            // Strictly greater so ties go to the first candidate seen
            if best.is_none_or(|(_, top, _, _)| combined > top) {
                best = Some((index, combined, historical, predicted));
            }
        }

        let (index, combined, historical, predicted) = best?;
        let candidate = candidates[index].clone();

        debug!(
            candidate = %candidate,
            task_type = %task_type,
            strategy = %strategy,
            combined,
            historical,
            predicted,
            "Selected candidate"
        );

        Some(RoutingDecision {
            alternatives: alternatives(candidates, &candidate),
            candidate,
            task_type,
            score: combined,
            reason: RoutingReason::Performance { historical, predicted },
        })
    }

    /// Confidence-weighted score of a prediction under `strategy`
    pub fn predicted_score(&self, prediction: &Prediction, strategy: Strategy) -> f64 {
        let weights = self.config.strategy_weights.for_strategy(strategy);
        let latency_score = self.latency_factor(prediction.latency_ms);
        let cost_score = self.cost_factor(prediction.cost_usd);

        prediction.confidence
            * (weights.reliability * prediction.reliability
                + weights.latency * latency_score
                + weights.cost * cost_score)
    }

    fn latency_factor(&self, latency_ms: f64) -> f64 {
        (1.0 - latency_ms / self.config.latency_ceiling_ms).max(0.0)
    }

    fn cost_factor(&self, cost_usd: f64) -> f64 {
        (1.0 - cost_usd / self.config.cost_ceiling_usd).max(0.0)
    }

    /// Fold an observed outcome into the pair's score
    pub fn update_from_result(
        &self,
        candidate: &Candidate,
        task_type: TaskType,
        success: bool,
        latency_ms: u64,
        cost_usd: f64,
    ) {
        let [w_success, w_latency, w_cost] = self.config.reward_weights;
        let reward = w_success * if success { 1.0 } else { 0.0 }
            + w_latency * self.latency_factor(latency_ms as f64)
            + w_cost * self.cost_factor(cost_usd);

        let updated = {
            let mut score = self
                .scores
                .entry((candidate.clone(), task_type))
                .or_insert(NEUTRAL_SCORE);
            *score += self.config.learning_rate * (reward - *score);
            *score = score.clamp(0.0, 1.0);
            *score
        };
        let samples = self.total_samples.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(
            candidate = %candidate,
            task_type = %task_type,
            success,
            reward,
            score = updated,
            samples,
            "Updated routing score"
        );
    }

    /// Recompute the exploration rate from the sample count
    ///
    /// Returns the rate now in effect.
    pub fn adjust_exploration_rate(&self) -> f64 {
        let mut exploration = self.exploration.lock();
        if exploration.pinned {
            return exploration.rate;
        }

        let samples = self.total_samples() as f64;
        let decayed = self.config.exploration_decay_start
            - samples / self.config.exploration_decay_samples * self.config.exploration_decay_span;
        exploration.rate = decayed.max(self.config.min_exploration_rate);
        exploration.rate
    }

    /// Pull every score toward the neutral prior by `rate`
    pub fn decay_scores(&self, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        if rate == 0.0 {
            return;
        }
        for mut entry in self.scores.iter_mut() {
            let score = entry.value_mut();
            *score += rate * (NEUTRAL_SCORE - *score);
        }
    }

    /// Learned score for a pair, or the neutral prior
    pub fn score(&self, candidate: &Candidate, task_type: TaskType) -> f64 {
        self.scores
            .get(&(candidate.clone(), task_type))
            .map(|s| *s)
            .unwrap_or(NEUTRAL_SCORE)
    }

    /// Current exploration rate
    pub fn exploration_rate(&self) -> f64 {
        self.exploration.lock().rate
    }

    /// Outcomes observed so far
    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    /// Configuration in use
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }
}

fn alternatives(candidates: &[Candidate], chosen: &Candidate) -> Vec<Candidate> {
    candidates.iter().filter(|c| *c != chosen).cloned().collect()
}

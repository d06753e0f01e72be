//! Performance predictor
//!
//! Keeps rolling statistics per candidate and turns them into latency,
//! cost and reliability predictions for a pending request. Candidates
//! without history get a fixed low-confidence prediction so they are
//! still explored.

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stats::ModelStatistics;
use crate::clock::{SharedClock, system_clock};
use crate::config::PredictorConfig;
use crate::task::{Candidate, TaskRequest};

/// Latency predicted for candidates with no history
pub const DEFAULT_LATENCY_MS: f64 = 1_000.0;
/// Cost predicted for candidates with no history
pub const DEFAULT_COST_USD: f64 = 0.01;
/// Reliability predicted for candidates with no history
pub const DEFAULT_RELIABILITY: f64 = 0.8;
/// Confidence attached to default predictions
pub const DEFAULT_CONFIDENCE: f64 = 0.1;

/// Request features that influence the latency prediction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFeatures {
    /// Prompt length in token-equivalents
    pub prompt_tokens: usize,
    /// Caller-supplied complexity score (0.0 to 1.0)
    pub complexity: Option<f64>,
    /// Hour of day (UTC); the predictor's clock is used when absent
    pub hour_utc: Option<u32>,
}

impl RequestFeatures {
    /// Extract features from a task request
    pub fn from_request(request: &TaskRequest) -> Self {
        Self {
            prompt_tokens: request.prompt_tokens_estimate(),
            complexity: request.complexity,
            hour_utc: None,
        }
    }

    /// Pin the hour of day
    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour_utc = Some(hour % 24);
        self
    }
}

/// Predicted performance of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub candidate: Candidate,
    pub latency_ms: f64,
    pub cost_usd: f64,
    pub reliability: f64,
    /// How much the optimizer should trust this prediction (0.0 to 1.0)
    pub confidence: f64,
    /// Attempts the prediction is based on
    pub sample_count: u64,
}

impl Prediction {
    /// Fixed prediction for a candidate with no history
    pub fn default_for(candidate: Candidate) -> Self {
        Self {
            candidate,
            latency_ms: DEFAULT_LATENCY_MS,
            cost_usd: DEFAULT_COST_USD,
            reliability: DEFAULT_RELIABILITY,
            confidence: DEFAULT_CONFIDENCE,
            sample_count: 0,
        }
    }
}

/// One observed attempt, retained for maintenance and offline analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub candidate: Candidate,
    pub latency_ms: u64,
    pub success: bool,
    pub cost_usd: f64,
    pub observed_at: DateTime<Utc>,
}

/// Rolling-statistics performance predictor
#[derive(Debug)]
pub struct PerformancePredictor {
    config: PredictorConfig,
    stats: DashMap<Candidate, ModelStatistics>,
    history: Mutex<Vec<TrainingSample>>,
    clock: SharedClock,
}

impl Default for PerformancePredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl PerformancePredictor {
    /// Create a predictor using wall-clock time
    pub fn new(config: PredictorConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a predictor reading time from `clock`
    pub fn with_clock(config: PredictorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            stats: DashMap::new(),
            history: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Record the outcome of one attempt against `candidate`
    pub fn update_model_stats(&self, candidate: &Candidate, latency_ms: u64, success: bool, cost_usd: f64) {
        let now = self.clock.now();
        {
            let mut entry = self
                .stats
                .entry(candidate.clone())
                .or_insert_with(|| ModelStatistics::new(candidate.clone(), self.config.latency_window, now));
            entry.record(latency_ms, success, cost_usd, now);
        }

        self.history.lock().push(TrainingSample {
            candidate: candidate.clone(),
            latency_ms,
            success,
            cost_usd,
            observed_at: now,
        });
    }

    /// Predict latency, cost and reliability for each candidate
    pub fn predict_performance(&self, candidates: &[Candidate], features: &RequestFeatures) -> Vec<Prediction> {
        let multiplier = self.latency_multiplier(features);

        candidates
            .iter()
            .map(|candidate| {
                let Some(stats) = self.stats.get(candidate) else {
                    return Prediction::default_for(candidate.clone());
                };
                let Some(baseline) = stats.recent_mean_latency(self.config.baseline_samples) else {
                    return Prediction::default_for(candidate.clone());
                };

                let samples = stats.total_requests();
                let confidence = (samples as f64 / self.config.baseline_samples as f64).clamp(DEFAULT_CONFIDENCE, 1.0);
                let cost_usd = if stats.has_cost_history() {
                    stats.avg_cost_usd
                } else {
                    DEFAULT_COST_USD
                };

                Prediction {
                    candidate: candidate.clone(),
                    latency_ms: baseline * multiplier,
                    cost_usd,
                    reliability: stats.reliability,
                    confidence,
                    sample_count: samples,
                }
            })
            .collect()
    }

    fn latency_multiplier(&self, features: &RequestFeatures) -> f64 {
        let mut multiplier = 1.0;

        if features.prompt_tokens > self.config.long_prompt_tokens {
            multiplier *= self.config.long_prompt_factor;
        }
        if features
            .complexity
            .is_some_and(|c| c > self.config.complexity_threshold)
        {
            multiplier *= self.config.high_complexity_factor;
        }

        let hour = features.hour_utc.unwrap_or_else(|| self.clock.now().hour());
        if self.config.high_peak_hours.contains(&hour) {
            multiplier *= self.config.high_peak_factor;
        } else if self.config.peak_hours.contains(&hour) {
            multiplier *= self.config.peak_factor;
        }

        multiplier
    }

    /// Maintenance hook: drop the oldest training samples beyond the retention bound
    ///
    /// Returns the number of samples dropped. No model fitting happens here;
    /// the rolling statistics are already current.
    pub fn train(&self) -> usize {
        let mut history = self.history.lock();
        let excess = history.len().saturating_sub(self.config.max_history);
        if excess > 0 {
            history.drain(..excess);
            debug!(dropped = excess, retained = history.len(), "Trimmed predictor history");
        }
        excess
    }

    /// Statistics for one candidate
    pub fn stats(&self, candidate: &Candidate) -> Option<ModelStatistics> {
        self.stats.get(candidate).map(|s| s.clone())
    }

    /// Snapshot of every candidate's statistics
    pub fn all_stats(&self) -> Vec<ModelStatistics> {
        self.stats.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of retained training samples
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Configuration in use
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off_peak() -> RequestFeatures {
        RequestFeatures::default().at_hour(3)
    }

    #[test]
    fn test_no_history_returns_default_prediction() {
        let predictor = PerformancePredictor::default();
        let candidate = Candidate::new("openai", "gpt-4o");

        let predictions = predictor.predict_performance(&[candidate.clone()], &off_peak());

        assert_eq!(predictions, vec![Prediction::default_for(candidate)]);
        assert_eq!(predictions[0].latency_ms, 1_000.0);
        assert_eq!(predictions[0].reliability, 0.8);
        assert_eq!(predictions[0].confidence, 0.1);
    }

    #[test]
    fn test_baseline_uses_recent_samples() {
        let predictor = PerformancePredictor::default();
        let candidate = Candidate::new("openai", "gpt-4o");

        for _ in 0..50 {
            predictor.update_model_stats(&candidate, 5_000, true, 0.02);
        }
        for _ in 0..20 {
            predictor.update_model_stats(&candidate, 200, true, 0.02);
        }

        let prediction = &predictor.predict_performance(&[candidate], &off_peak())[0];
        assert!((prediction.latency_ms - 200.0).abs() < 1e-9);
        assert!((prediction.cost_usd - 0.02).abs() < 1e-9);
        assert_eq!(prediction.confidence, 1.0);
        assert_eq!(prediction.sample_count, 70);
    }

    #[test]
    fn test_latency_adjustments_compound() {
        let predictor = PerformancePredictor::default();
        let candidate = Candidate::new("anthropic", "claude-sonnet-4");
        for _ in 0..20 {
            predictor.update_model_stats(&candidate, 1_000, true, 0.01);
        }

        let long_complex = RequestFeatures {
            prompt_tokens: 1_500,
            complexity: Some(0.9),
            hour_utc: Some(3),
        };
        let prediction = &predictor.predict_performance(&[candidate.clone()], &long_complex)[0];
        assert!((prediction.latency_ms - 1_000.0 * 1.2 * 1.3).abs() < 1e-6);

        let peak = RequestFeatures::default().at_hour(10);
        let prediction = &predictor.predict_performance(&[candidate.clone()], &peak)[0];
        assert!((prediction.latency_ms - 1_100.0).abs() < 1e-6);

        let high_peak = RequestFeatures::default().at_hour(13);
        let prediction = &predictor.predict_performance(&[candidate], &high_peak)[0];
        assert!((prediction.latency_ms - 1_150.0).abs() < 1e-6);
    }

    #[test]
    fn test_configured_latency_factors() {
        let config = PredictorConfig {
            long_prompt_factor: 2.0,
            peak_factor: 1.5,
            ..PredictorConfig::default()
        };
        let predictor = PerformancePredictor::new(config);
        let candidate = Candidate::new("openai", "gpt-4o");
        for _ in 0..20 {
            predictor.update_model_stats(&candidate, 100, true, 0.01);
        }

        let features = RequestFeatures {
            prompt_tokens: 2_000,
            complexity: None,
            hour_utc: Some(10),
        };
        let prediction = &predictor.predict_performance(&[candidate], &features)[0];
        assert!((prediction.latency_ms - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_grows_with_samples() {
        let predictor = PerformancePredictor::default();
        let candidate = Candidate::new("google", "gemini-2.0-flash");

        predictor.update_model_stats(&candidate, 300, true, 0.001);
        let low = predictor.predict_performance(&[candidate.clone()], &off_peak())[0].confidence;

        for _ in 0..9 {
            predictor.update_model_stats(&candidate, 300, true, 0.001);
        }
        let higher = predictor.predict_performance(&[candidate], &off_peak())[0].confidence;

        assert!(low >= DEFAULT_CONFIDENCE);
        assert!(higher > low);
        assert!((higher - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_failures_lower_reliability() {
        let predictor = PerformancePredictor::default();
        let candidate = Candidate::new("mistral", "mistral-large");

        predictor.update_model_stats(&candidate, 400, true, 0.01);
        predictor.update_model_stats(&candidate, 30_000, false, 0.0);

        let stats = predictor.stats(&candidate).unwrap();
        assert_eq!(stats.failure_count, 1);
        assert!((stats.reliability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_train_truncates_history() {
        let config = PredictorConfig {
            max_history: 10,
            ..PredictorConfig::default()
        };
        let predictor = PerformancePredictor::new(config);
        let candidate = Candidate::new("openai", "gpt-4o-mini");

        for _ in 0..25 {
            predictor.update_model_stats(&candidate, 100, true, 0.001);
        }
        assert_eq!(predictor.history_len(), 25);

        assert_eq!(predictor.train(), 15);
        assert_eq!(predictor.history_len(), 10);
        assert_eq!(predictor.train(), 0);

        // Statistics are untouched by training
        assert_eq!(predictor.stats(&candidate).unwrap().total_requests(), 25);
    }
}

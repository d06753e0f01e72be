//! Business value tracking
//!
//! Tracks operational quality over a sliding window of recent executions
//! (success rate, response time, SLA compliance) and the cumulative cost
//! savings achieved against a per-task-type baseline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrackerConfig;
use crate::task::TaskType;

#[derive(Debug, Clone, Copy)]
struct ExecutionSample {
    duration_ms: u64,
    success: bool,
}

#[derive(Debug, Default)]
struct SavingsLedger {
    total_savings_usd: f64,
    total_cost_usd: f64,
}

/// Snapshot of tracked business metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetrics {
    /// Executions currently in the window
    pub window_samples: usize,
    /// Executions tracked since creation or the last reset
    pub total_executions: u64,
    /// Successful fraction of the window (0.0 when empty)
    pub success_rate: f64,
    /// Mean duration over the window in milliseconds
    pub avg_response_time_ms: f64,
    /// Fraction of the window within the SLA threshold (0.0 when empty)
    pub sla_compliance: f64,
    /// SLA threshold used for compliance
    pub sla_threshold_ms: u64,
    /// Cumulative savings against baselines in USD
    pub total_savings_usd: f64,
    /// Cumulative spend passed to cost tracking in USD
    pub total_cost_usd: f64,
}

/// Tracks success, latency, SLA compliance and cost savings
#[derive(Debug)]
pub struct BusinessValueTracker {
    config: TrackerConfig,
    window: Mutex<VecDeque<ExecutionSample>>,
    total_executions: AtomicU64,
    baselines: DashMap<TaskType, f64>,
    savings: Mutex<SavingsLedger>,
}

impl Default for BusinessValueTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl BusinessValueTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(config.window_size)),
            config,
            total_executions: AtomicU64::new(0),
            baselines: DashMap::new(),
            savings: Mutex::new(SavingsLedger::default()),
        }
    }

    /// Add one execution to the sliding window
    pub fn track_execution(&self, duration_ms: u64, success: bool) {
        {
            let mut window = self.window.lock();
            if window.len() >= self.config.window_size.max(1) {
                window.pop_front();
            }
            window.push_back(ExecutionSample { duration_ms, success });
        }
        self.total_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the cost of a successful execution and accumulate savings
    ///
    /// The first cost seen for a task type becomes its baseline unless one
    /// was set explicitly. Returns the savings attributed to this call,
    /// which is negative when it cost more than the baseline.
    pub fn track_cost_savings(&self, task_type: TaskType, actual_cost_usd: f64) -> f64 {
        let baseline = *self.baselines.entry(task_type).or_insert(actual_cost_usd);
        let saved = baseline - actual_cost_usd;

        let mut ledger = self.savings.lock();
        ledger.total_savings_usd += saved;
        ledger.total_cost_usd += actual_cost_usd;

        debug!(
            task_type = %task_type,
            baseline,
            actual = actual_cost_usd,
            saved,
            total = ledger.total_savings_usd,
            "Tracked cost savings"
        );
        saved
    }

    /// Set an explicit baseline cost for a task type
    pub fn set_baseline(&self, task_type: TaskType, cost_usd: f64) {
        self.baselines.insert(task_type, cost_usd);
    }

    /// Baseline cost for a task type, if established
    pub fn baseline(&self, task_type: TaskType) -> Option<f64> {
        self.baselines.get(&task_type).map(|b| *b)
    }

    /// Total savings divided by `implementation_cost_usd`
    ///
    /// Returns `None` unless the implementation cost is positive.
    pub fn calculate_roi(&self, implementation_cost_usd: f64) -> Option<f64> {
        if implementation_cost_usd <= 0.0 || !implementation_cost_usd.is_finite() {
            return None;
        }
        Some(self.savings.lock().total_savings_usd / implementation_cost_usd)
    }

    /// Cumulative savings in USD
    pub fn total_savings(&self) -> f64 {
        self.savings.lock().total_savings_usd
    }

    pub fn metrics(&self) -> BusinessMetrics {
        let (window_samples, success_rate, avg_response_time_ms, sla_compliance) = {
            let window = self.window.lock();
            let n = window.len();
            if n == 0 {
                (0, 0.0, 0.0, 0.0)
            } else {
                let successes = window.iter().filter(|s| s.success).count();
                let total_ms: u64 = window.iter().map(|s| s.duration_ms).sum();
                let within_sla = window
                    .iter()
                    .filter(|s| s.duration_ms <= self.config.sla_threshold_ms)
                    .count();
                (
                    n,
                    successes as f64 / n as f64,
                    total_ms as f64 / n as f64,
                    within_sla as f64 / n as f64,
                )
            }
        };

        let ledger = self.savings.lock();
        BusinessMetrics {
            window_samples,
            total_executions: self.total_executions.load(Ordering::Relaxed),
            success_rate,
            avg_response_time_ms,
            sla_compliance,
            sla_threshold_ms: self.config.sla_threshold_ms,
            total_savings_usd: ledger.total_savings_usd,
            total_cost_usd: ledger.total_cost_usd,
        }
    }

    /// Clear the window, counters, savings and baselines
    pub fn reset(&self) {
        self.window.lock().clear();
        self.total_executions.store(0, Ordering::Relaxed);
        *self.savings.lock() = SavingsLedger::default();
        self.baselines.clear();
    }
}

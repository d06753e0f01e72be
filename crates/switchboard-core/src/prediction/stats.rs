//! Rolling per-candidate statistics

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Candidate;

/// Rolling statistics for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatistics {
    /// The candidate these statistics describe
    pub candidate: Candidate,
    /// Recent latencies in milliseconds, oldest first
    latencies: VecDeque<u64>,
    /// Ring buffer capacity
    capacity: usize,
    /// Number of successful attempts
    pub success_count: u64,
    /// Number of failed attempts
    pub failure_count: u64,
    /// Failures over total attempts
    pub error_rate: f64,
    /// `1 - error_rate`
    pub reliability: f64,
    /// Running average cost of successful attempts in USD
    pub avg_cost_usd: f64,
    /// Attempts contributing to `avg_cost_usd`
    cost_samples: u64,
    /// Time of the last update
    pub last_updated: DateTime<Utc>,
}

impl ModelStatistics {
    /// Create empty statistics with the given latency window
    pub fn new(candidate: Candidate, capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            candidate,
            latencies: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            success_count: 0,
            failure_count: 0,
            error_rate: 0.0,
            reliability: 1.0,
            avg_cost_usd: 0.0,
            cost_samples: 0,
            last_updated: now,
        }
    }

    /// Fold one completed attempt into the statistics
    pub fn record(&mut self, latency_ms: u64, success: bool, cost_usd: f64, now: DateTime<Utc>) {
        if self.latencies.len() == self.capacity {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);

        if success {
            self.success_count += 1;
            // Failed calls are not billed, so only successes move the average
            self.cost_samples += 1;
            let n = self.cost_samples as f64;
            self.avg_cost_usd += (cost_usd - self.avg_cost_usd) / n;
        } else {
            self.failure_count += 1;
        }

        let total = self.total_requests() as f64;
        self.error_rate = self.failure_count as f64 / total;
        self.reliability = 1.0 - self.error_rate;
        self.last_updated = now;
    }

    /// Total attempts recorded
    pub fn total_requests(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Whether any successful attempt has reported a cost
    pub fn has_cost_history(&self) -> bool {
        self.cost_samples > 0
    }

    /// Latencies currently held in the ring buffer, oldest first
    pub fn latencies(&self) -> impl Iterator<Item = u64> + '_ {
        self.latencies.iter().copied()
    }

    /// Number of latencies in the ring buffer
    pub fn latency_samples(&self) -> usize {
        self.latencies.len()
    }

    /// Mean of the most recent `n` latencies
    pub fn recent_mean_latency(&self, n: usize) -> Option<f64> {
        if self.latencies.is_empty() || n == 0 {
            return None;
        }
        let take = n.min(self.latencies.len());
        let sum: u64 = self.latencies.iter().rev().take(take).sum();
        Some(sum as f64 / take as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(capacity: usize) -> ModelStatistics {
        ModelStatistics::new(Candidate::new("openai", "gpt-4o"), capacity, Utc::now())
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut s = stats(3);
        for latency in [10, 20, 30, 40] {
            s.record(latency, true, 0.0, Utc::now());
        }
        assert_eq!(s.latencies().collect::<Vec<_>>(), vec![20, 30, 40]);
        assert_eq!(s.total_requests(), 4);
    }

    #[test]
    fn test_error_rate_and_reliability() {
        let mut s = stats(10);
        s.record(100, true, 0.01, Utc::now());
        s.record(100, true, 0.01, Utc::now());
        s.record(100, true, 0.01, Utc::now());
        s.record(100, false, 0.0, Utc::now());

        assert!((s.error_rate - 0.25).abs() < 1e-9);
        assert!((s.reliability - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_cost_running_average_ignores_failures() {
        let mut s = stats(10);
        s.record(100, true, 0.01, Utc::now());
        s.record(100, true, 0.03, Utc::now());
        s.record(100, false, 0.0, Utc::now());

        assert!((s.avg_cost_usd - 0.02).abs() < 1e-9);
        assert!(s.has_cost_history());
    }

    #[test]
    fn test_recent_mean_latency() {
        let mut s = stats(100);
        assert!(s.recent_mean_latency(20).is_none());

        for latency in 1..=30u64 {
            s.record(latency * 10, true, 0.0, Utc::now());
        }
        // Last 20 samples are 110..=300
        let mean = s.recent_mean_latency(20).unwrap();
        assert!((mean - 205.0).abs() < 1e-9);
    }
}

//! Types for routing decisions
//!
//! This module defines the strategies and decision records used by the
//! routing optimizer when choosing a candidate for each task.

use serde::{Deserialize, Serialize};

use crate::task::{Candidate, TaskType};

/// Selection strategy applied when scoring candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Prefer the cheapest candidates
    CostOptimized,
    /// Prefer the fastest candidates
    PerformanceOptimized,
    /// Lean on reliability, with latency and cost weighted evenly
    CapabilityOptimized,
    /// Prefer the most reliable candidates
    ReliabilityOptimized,
    /// Honor the caller's provider preference, balanced otherwise
    UserPreferred,
    /// Balance reliability, latency and cost
    #[default]
    Balanced,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CostOptimized => write!(f, "cost_optimized"),
            Self::PerformanceOptimized => write!(f, "performance_optimized"),
            Self::CapabilityOptimized => write!(f, "capability_optimized"),
            Self::ReliabilityOptimized => write!(f, "reliability_optimized"),
            Self::UserPreferred => write!(f, "user_preferred"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cost_optimized" | "cost" => Ok(Self::CostOptimized),
            "performance_optimized" | "performance" | "fast" => Ok(Self::PerformanceOptimized),
            "capability_optimized" | "capability" => Ok(Self::CapabilityOptimized),
            "reliability_optimized" | "reliability" => Ok(Self::ReliabilityOptimized),
            "user_preferred" => Ok(Self::UserPreferred),
            "balanced" => Ok(Self::Balanced),
            _ => Err(format!("Unknown routing strategy: {}", s)),
        }
    }
}

/// Relative weights of the predicted-score components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub reliability: f64,
    pub latency: f64,
    pub cost: f64,
}

impl ScoreWeights {
    pub fn new(reliability: f64, latency: f64, cost: f64) -> Self {
        Self {
            reliability,
            latency,
            cost,
        }
    }

    /// Sum of the three weights
    pub fn total(&self) -> f64 {
        self.reliability + self.latency + self.cost
    }
}

/// Score weights for every strategy
///
/// `user_preferred` has no entry of its own: the caller's provider
/// preference narrows the candidates and the balanced weights rank them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub balanced: ScoreWeights,
    pub cost_optimized: ScoreWeights,
    pub performance_optimized: ScoreWeights,
    pub reliability_optimized: ScoreWeights,
    pub capability_optimized: ScoreWeights,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            balanced: ScoreWeights::new(0.4, 0.3, 0.3),
            cost_optimized: ScoreWeights::new(0.2, 0.1, 0.7),
            performance_optimized: ScoreWeights::new(0.2, 0.7, 0.1),
            reliability_optimized: ScoreWeights::new(0.7, 0.15, 0.15),
            capability_optimized: ScoreWeights::new(0.5, 0.25, 0.25),
        }
    }
}

impl StrategyWeights {
    /// Weights applied to (reliability, latency score, cost score) under `strategy`
    pub fn for_strategy(&self, strategy: Strategy) -> ScoreWeights {
        match strategy {
            Strategy::Balanced | Strategy::UserPreferred => self.balanced,
            Strategy::CostOptimized => self.cost_optimized,
            Strategy::PerformanceOptimized => self.performance_optimized,
            Strategy::ReliabilityOptimized => self.reliability_optimized,
            Strategy::CapabilityOptimized => self.capability_optimized,
        }
    }

    /// Every configured triple, labelled by strategy
    pub fn entries(&self) -> [(Strategy, ScoreWeights); 5] {
        [
            (Strategy::Balanced, self.balanced),
            (Strategy::CostOptimized, self.cost_optimized),
            (Strategy::PerformanceOptimized, self.performance_optimized),
            (Strategy::ReliabilityOptimized, self.reliability_optimized),
            (Strategy::CapabilityOptimized, self.capability_optimized),
        ]
    }
}

/// Result of a routing decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected candidate
    pub candidate: Candidate,
    /// Task type the decision was made for
    pub task_type: TaskType,
    /// Combined score of the selected candidate (1.0 for forced picks)
    pub score: f64,
    /// Reason for selection
    pub reason: RoutingReason,
    /// Other candidates that were considered
    pub alternatives: Vec<Candidate>,
}

impl RoutingDecision {
    /// Whether this was a uniformly random exploration pick
    pub fn is_exploration(&self) -> bool {
        matches!(self.reason, RoutingReason::Exploration)
    }
}

/// Reason for a routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// Highest combined historical/predicted score
    Performance { historical: f64, predicted: f64 },
    /// Uniformly random pick to gather more data
    Exploration,
    /// Only one candidate was eligible
    SingleCandidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "balanced".parse::<Strategy>().unwrap(),
            Strategy::Balanced
        );
        assert_eq!(
            "COST_OPTIMIZED".parse::<Strategy>().unwrap(),
            Strategy::CostOptimized
        );
        assert_eq!(
            "reliability-optimized".parse::<Strategy>().unwrap(),
            Strategy::ReliabilityOptimized
        );
        assert!("unknown".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_display_roundtrip() {
        for strategy in [
            Strategy::CostOptimized,
            Strategy::PerformanceOptimized,
            Strategy::CapabilityOptimized,
            Strategy::ReliabilityOptimized,
            Strategy::UserPreferred,
            Strategy::Balanced,
        ] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_default_strategy_weights_sum_to_one() {
        let weights = StrategyWeights::default();
        for (strategy, w) in weights.entries() {
            assert!((w.total() - 1.0).abs() < 1e-9, "{} weights sum to {}", strategy, w.total());
        }
        assert_eq!(
            weights.for_strategy(Strategy::UserPreferred),
            weights.for_strategy(Strategy::Balanced)
        );
        assert_eq!(
            weights.for_strategy(Strategy::Balanced),
            ScoreWeights::new(0.4, 0.3, 0.3)
        );
    }
}

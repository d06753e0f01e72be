//! Per-candidate circuit breakers
//!
//! Each candidate gets its own breaker. Consecutive failures past the
//! threshold open the circuit and the candidate is skipped. Once the reset
//! timeout has passed since the last failure, a single probe is admitted;
//! enough successful probes in a row close the circuit again, while a
//! failed probe restarts the timeout.
//!
//! Breakers live in a sharded map so different candidates never contend.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{SharedClock, system_clock};
use crate::config::CircuitBreakerConfig;
use crate::task::Candidate;

/// Derived breaker label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Healthy, requests allowed
    Closed,
    /// Tripped, requests refused until the reset timeout passes
    Open,
    /// Recovering, single probes allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CircuitState {
    is_open: bool,
    failure_count: u32,
    consecutive_successes: u32,
    last_failure_time: Option<DateTime<Utc>>,
    recovery_attempt_time: Option<DateTime<Utc>>,
}

impl CircuitState {
    /// A probe whose outcome never arrived stops blocking after one reset timeout
    fn probe_in_flight(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.recovery_attempt_time
            .is_some_and(|started| now - started < timeout)
    }

    fn cooled_down(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.last_failure_time
            .is_none_or(|failed| now - failed >= timeout)
    }

    fn admits(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if !self.is_open {
            return true;
        }
        if self.probe_in_flight(now, timeout) {
            return false;
        }
        self.consecutive_successes > 0 || self.cooled_down(now, timeout)
    }

    fn status(&self, now: DateTime<Utc>, timeout: Duration) -> CircuitStatus {
        if !self.is_open {
            CircuitStatus::Closed
        } else if self.recovery_attempt_time.is_some()
            || self.consecutive_successes > 0
            || self.cooled_down(now, timeout)
        {
            CircuitStatus::HalfOpen
        } else {
            CircuitStatus::Open
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub candidate: Candidate,
    pub status: CircuitStatus,
    pub is_open: bool,
    pub failure_count: u32,
    pub consecutive_successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub recovery_attempt_time: Option<DateTime<Utc>>,
}

/// Bank of circuit breakers keyed by candidate
#[derive(Debug)]
pub struct CircuitBreakerBank {
    config: CircuitBreakerConfig,
    breakers: DashMap<Candidate, CircuitState>,
    clock: SharedClock,
}

impl Default for CircuitBreakerBank {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerBank {
    /// Create a bank using wall-clock time
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a bank reading time from `clock`
    pub fn with_clock(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
            clock,
        }
    }

    fn reset_timeout(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.config.reset_timeout_ms).unwrap_or(i64::MAX))
    }

    /// Whether the gate would admit a request right now, without claiming a probe
    pub fn is_available(&self, candidate: &Candidate) -> bool {
        match self.breakers.get(candidate) {
            Some(state) => state.admits(self.clock.now(), self.reset_timeout()),
            None => true,
        }
    }

    /// Pass the gate for a dispatch
    ///
    /// Closed circuits always admit. An open circuit admits a single probe
    /// and marks it in flight, so concurrent callers are refused until the
    /// probe's outcome is recorded.
    pub fn try_acquire(&self, candidate: &Candidate) -> bool {
        let now = self.clock.now();
        let timeout = self.reset_timeout();

        let Some(mut state) = self.breakers.get_mut(candidate) else {
            return true;
        };
        if !state.admits(now, timeout) {
            return false;
        }
        if state.is_open {
            state.recovery_attempt_time = Some(now);
            debug!(candidate = %candidate, "Admitted recovery probe");
        }
        true
    }

    /// Record a successful attempt
    pub fn record_success(&self, candidate: &Candidate) {
        let Some(mut state) = self.breakers.get_mut(candidate) else {
            return;
        };

        if !state.is_open {
            state.failure_count = 0;
            return;
        }

        state.recovery_attempt_time = None;
        state.consecutive_successes += 1;
        if state.consecutive_successes >= self.config.successes_to_close {
            *state = CircuitState::default();
            info!(candidate = %candidate, "Circuit closed");
        } else {
            debug!(
                candidate = %candidate,
                successes = state.consecutive_successes,
                needed = self.config.successes_to_close,
                "Recovery probe succeeded"
            );
        }
    }

    /// Record a failed attempt
    pub fn record_failure(&self, candidate: &Candidate) {
        let now = self.clock.now();
        let mut state = self.breakers.entry(candidate.clone()).or_default();

        if state.is_open {
            state.recovery_attempt_time = None;
            state.consecutive_successes = 0;
            state.last_failure_time = Some(now);
            debug!(candidate = %candidate, "Recovery probe failed");
            return;
        }

        state.failure_count += 1;
        state.last_failure_time = Some(now);
        if state.failure_count >= self.config.failure_threshold {
            state.is_open = true;
            state.consecutive_successes = 0;
            state.recovery_attempt_time = None;
            info!(
                candidate = %candidate,
                failures = state.failure_count,
                reset_timeout_ms = self.config.reset_timeout_ms,
                "Circuit opened"
            );
        }
    }

    /// Forget all state for one candidate
    pub fn reset(&self, candidate: &Candidate) {
        if self.breakers.remove(candidate).is_some() {
            info!(candidate = %candidate, "Circuit reset");
        }
    }

    /// Forget all state for every candidate
    pub fn reset_all(&self) {
        self.breakers.clear();
        info!("All circuits reset");
    }

    /// Derived label for one candidate
    pub fn circuit_status(&self, candidate: &Candidate) -> CircuitStatus {
        self.breakers
            .get(candidate)
            .map(|state| state.status(self.clock.now(), self.reset_timeout()))
            .unwrap_or(CircuitStatus::Closed)
    }

    /// Snapshot of every tracked breaker, sorted by candidate
    pub fn status(&self) -> Vec<CircuitSnapshot> {
        let now = self.clock.now();
        let timeout = self.reset_timeout();

        let mut snapshots: Vec<CircuitSnapshot> = self
            .breakers
            .iter()
            .map(|entry| {
                let state = entry.value();
                CircuitSnapshot {
                    candidate: entry.key().clone(),
                    status: state.status(now, timeout),
                    is_open: state.is_open,
                    failure_count: state.failure_count,
                    consecutive_successes: state.consecutive_successes,
                    last_failure_time: state.last_failure_time,
                    recovery_attempt_time: state.recovery_attempt_time,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.candidate.cmp(&b.candidate));
        snapshots
    }

    /// Configuration in use
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

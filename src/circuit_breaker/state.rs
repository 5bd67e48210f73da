//! Circuit breaker state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// The three positions of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests pass through; failures are counted.
    Closed,
    /// Requests are rejected until the cooldown elapses.
    Open,
    /// A limited number of probes are let through.
    HalfOpen,
}

impl CircuitState {
    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The mutable state of a circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerState {
    /// Current position of the circuit.
    pub circuit: CircuitState,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// When the most recent failure was recorded.
    pub last_failure: Option<Instant>,
    /// Probes admitted since entering half-open.
    pub half_open_calls: u32,
    /// When the most recent half-open probe was admitted.
    pub last_probe: Option<Instant>,
}

impl BreakerState {
    /// Creates a new closed state.
    pub fn closed() -> Self {
        Self {
            circuit: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            half_open_calls: 0,
            last_probe: None,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        self.circuit == CircuitState::Closed
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        self.circuit == CircuitState::Open
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        self.circuit == CircuitState::HalfOpen
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Cumulative counters about breaker behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Calls admitted by `can_call`.
    pub allowed: u64,
    /// Calls denied by `can_call`.
    pub rejected: u64,
    /// Successes recorded.
    pub successes: u64,
    /// Failures recorded.
    pub failures: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed from half-open.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fraction of recorded outcomes that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 1.0;
        }
        self.successes as f64 / total as f64
    }
}

/// A serializable snapshot of a breaker, for health endpoints and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Name of the protected dependency.
    pub name: String,
    /// Current position of the circuit.
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Failures needed to open the circuit.
    pub failure_threshold: u32,
    /// Cooldown in seconds.
    pub cooldown_secs: u64,
    /// Seconds since the last failure, if any was recorded.
    pub seconds_since_last_failure: Option<f64>,
    /// Probes admitted since entering half-open.
    pub half_open_calls: u32,
    /// Maximum half-open probes.
    pub half_open_max_calls: u32,
    /// Cumulative counters.
    pub metrics: BreakerMetrics,
}

//! Circuit breaker implementation.

use crate::audit::{self, CircuitAuditEvent};
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerState, BreakerStatus, CircuitState};
use crate::core::{FetchError, FetchReason};

use chrono::Utc;
use std::sync::RwLock;
use tokio::time::Instant;

/// How a call got past the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The circuit is closed.
    Normal,
    /// This call moved the circuit from open to half-open. It holds no
    /// probe slot.
    FirstProbe,
    /// The circuit is half-open and this call holds a probe slot.
    Probe,
}

/// An admitted call whose outcome has not been reported yet.
///
/// Returned by [`CircuitBreaker::admit`]. Report the outcome with
/// [`record`](Self::record). If the guard is dropped without a recorded
/// outcome (the caller was cancelled, or the outcome did not count under
/// the failure policy) its probe slot is handed back.
#[derive(Debug)]
#[must_use = "dropping the guard releases the probe slot immediately"]
pub struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    resolved: bool,
}

impl ProbeGuard<'_> {
    /// How the call was admitted.
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Reports the outcome through [`CircuitBreaker::record_reason`].
    ///
    /// Returns `true` if the outcome changed the breaker's counters.
    pub fn record(mut self, reason: &FetchReason) -> bool {
        self.resolved = self.breaker.record_reason(reason);
        self.resolved
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.admission == Admission::Probe {
            self.breaker.release_probe();
        }
    }
}

/// A cost-limiting circuit breaker in front of the paid render provider.
///
/// The breaker does not wrap the call itself; the caller asks
/// [`can_call`](Self::can_call) first and reports the outcome afterwards.
///
/// # States
///
/// - **Closed**: Normal operation. Calls pass through, failures are counted.
/// - **Open**: The provider is failing. Calls are denied until `cooldown`
///   has elapsed since the last failure.
/// - **Half-Open**: Probing. Up to `half_open_max_calls` calls are let
///   through; one success closes the circuit, one failure reopens it.
///
/// # Example
///
/// ```rust
/// use pagebridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_failure_threshold(2));
/// breaker.record_failure();
/// breaker.record_failure();
/// assert!(breaker.can_call().is_err());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Current state of the circuit.
    state: RwLock<BreakerState>,
    /// Configuration.
    config: CircuitBreakerConfig,
    /// Metrics.
    metrics: RwLock<BreakerMetrics>,
}

type Transition = Option<(CircuitState, CircuitState, u32)>;

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(BreakerState::closed()),
            config,
            metrics: RwLock::new(BreakerMetrics::new()),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Returns the current state of the circuit breaker.
    pub fn state(&self) -> BreakerState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Asks whether a call to the protected dependency may go out.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open here.
    /// The call that triggers that move is admitted without being counted
    /// against the probe limit.
    ///
    /// # Errors
    ///
    /// - [`FetchError::CircuitOpen`] with the remaining cooldown
    /// - [`FetchError::CircuitHalfOpenExhausted`] when all probes are taken
    pub fn can_call(&self) -> Result<Admission, FetchError> {
        let now = Instant::now();
        let (decision, transition) = {
            let mut state = self.write_state();
            match state.circuit {
                CircuitState::Closed => (Ok(Admission::Normal), None),

                CircuitState::Open => {
                    let elapsed = state
                        .last_failure
                        .map(|at| now.saturating_duration_since(at))
                        .unwrap_or(self.config.cooldown);
                    if elapsed >= self.config.cooldown {
                        state.circuit = CircuitState::HalfOpen;
                        state.half_open_calls = 0;
                        state.last_probe = Some(now);
                        (
                            Ok(Admission::FirstProbe),
                            Some((
                                CircuitState::Open,
                                CircuitState::HalfOpen,
                                state.consecutive_failures,
                            )),
                        )
                    } else {
                        (
                            Err(FetchError::CircuitOpen {
                                engine: self.config.name.clone(),
                                remaining: self.config.cooldown - elapsed,
                            }),
                            None,
                        )
                    }
                }

                CircuitState::HalfOpen => {
                    let cooldown = self.config.cooldown;
                    let stale = state.half_open_calls >= self.config.half_open_max_calls
                        && state
                            .last_probe
                            .is_some_and(|at| now.saturating_duration_since(at) >= cooldown);
                    if stale {
                        tracing::warn!(
                            breaker = %self.config.name,
                            unresolved = state.half_open_calls,
                            "Half-open probes unresolved after cooldown, admitting new probes"
                        );
                        state.half_open_calls = 0;
                    }

                    if state.half_open_calls < self.config.half_open_max_calls {
                        state.half_open_calls += 1;
                        state.last_probe = Some(now);
                        (Ok(Admission::Probe), None)
                    } else {
                        (
                            Err(FetchError::CircuitHalfOpenExhausted {
                                engine: self.config.name.clone(),
                            }),
                            None,
                        )
                    }
                }
            }
        };

        {
            let mut metrics = self.write_metrics();
            match decision {
                Ok(_) => metrics.allowed += 1,
                Err(_) => metrics.rejected += 1,
            }
        }
        self.announce(transition);
        decision
    }

    /// Like [`can_call`](Self::can_call), but returns a guard that hands
    /// the probe slot back unless an outcome is recorded through it.
    ///
    /// # Errors
    ///
    /// Same as [`can_call`](Self::can_call).
    pub fn admit(&self) -> Result<ProbeGuard<'_>, FetchError> {
        self.can_call().map(|admission| ProbeGuard {
            breaker: self,
            admission,
            resolved: false,
        })
    }

    /// Hands back one half-open probe slot whose outcome will never be
    /// reported. No-op unless the circuit is half-open.
    pub fn release_probe(&self) {
        let mut state = self.write_state();
        if state.circuit == CircuitState::HalfOpen && state.half_open_calls > 0 {
            state.half_open_calls -= 1;
            tracing::debug!(
                breaker = %self.config.name,
                half_open_calls = state.half_open_calls,
                "Probe slot released without an outcome"
            );
        }
    }

    /// Records a successful call.
    ///
    /// Half-open closes the circuit; closed resets the failure counter.
    pub fn record_success(&self) {
        let transition = {
            let mut state = self.write_state();
            self.write_metrics().successes += 1;

            match state.circuit {
                CircuitState::HalfOpen => {
                    let failures = state.consecutive_failures;
                    state.circuit = CircuitState::Closed;
                    state.consecutive_failures = 0;
                    state.half_open_calls = 0;
                    self.write_metrics().times_closed += 1;
                    Some((CircuitState::HalfOpen, CircuitState::Closed, failures))
                }
                CircuitState::Closed => {
                    state.consecutive_failures = 0;
                    None
                }
                CircuitState::Open => None,
            }
        };
        self.announce(transition);
    }

    /// Records a failed call.
    ///
    /// Half-open reopens the circuit; closed opens it once the threshold
    /// is reached.
    pub fn record_failure(&self) {
        let transition = {
            let mut state = self.write_state();
            self.write_metrics().failures += 1;

            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.last_failure = Some(Instant::now());

            match state.circuit {
                CircuitState::HalfOpen => {
                    state.circuit = CircuitState::Open;
                    state.half_open_calls = 0;
                    self.write_metrics().times_opened += 1;
                    Some((
                        CircuitState::HalfOpen,
                        CircuitState::Open,
                        state.consecutive_failures,
                    ))
                }
                CircuitState::Closed
                    if state.consecutive_failures >= self.config.failure_threshold =>
                {
                    state.circuit = CircuitState::Open;
                    self.write_metrics().times_opened += 1;
                    Some((
                        CircuitState::Closed,
                        CircuitState::Open,
                        state.consecutive_failures,
                    ))
                }
                _ => None,
            }
        };
        self.announce(transition);
    }

    /// Reports a fallback outcome.
    ///
    /// Fallback successes close or reset the circuit; failures count only
    /// when the configured [`FailurePolicy`](super::FailurePolicy) says so.
    /// Returns `false` if the reason was ignored.
    pub fn record_reason(&self, reason: &FetchReason) -> bool {
        if reason.is_fallback_success() {
            self.record_success();
            true
        } else if self.config.failure_policy.should_count(reason) {
            self.record_failure();
            true
        } else {
            false
        }
    }

    /// Returns a serializable snapshot of the breaker.
    pub fn status(&self) -> BreakerStatus {
        let state = self.state();
        BreakerStatus {
            name: self.config.name.clone(),
            state: state.circuit,
            consecutive_failures: state.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            cooldown_secs: self.config.cooldown.as_secs(),
            seconds_since_last_failure: state
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at).as_secs_f64()),
            half_open_calls: state.half_open_calls,
            half_open_max_calls: self.config.half_open_max_calls,
            metrics: self.metrics(),
        }
    }

    /// Forces the circuit into the open state, as if a failure just happened.
    pub fn force_open(&self) {
        let transition = {
            let mut state = self.write_state();
            let from = state.circuit;
            state.circuit = CircuitState::Open;
            state.last_failure = Some(Instant::now());
            state.half_open_calls = 0;
            self.write_metrics().times_opened += 1;
            (from != CircuitState::Open).then_some((
                from,
                CircuitState::Open,
                state.consecutive_failures,
            ))
        };
        self.announce(transition);
    }

    /// Resets the circuit breaker state and metrics.
    pub fn reset(&self) {
        *self.write_state() = BreakerState::closed();
        *self.write_metrics() = BreakerMetrics::new();
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BreakerState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> std::sync::RwLockWriteGuard<'_, BreakerMetrics> {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn announce(&self, transition: Transition) {
        let Some((from, to, consecutive_failures)) = transition else {
            return;
        };

        if to == CircuitState::Open {
            tracing::warn!(
                breaker = %self.config.name,
                from = %from,
                consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(
                breaker = %self.config.name,
                from = %from,
                to = %to,
                "Circuit breaker transition"
            );
        }

        audit::emit_circuit_transition(&CircuitAuditEvent {
            timestamp: Utc::now(),
            breaker: self.config.name.clone(),
            from,
            to,
            consecutive_failures,
        });
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::FailurePolicy;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_open_cooldown_half_open_close() {
        let breaker = CircuitBreaker::with_defaults();

        for _ in 0..5 {
            assert!(breaker.can_call().is_ok());
            breaker.record_failure();
        }
        assert!(breaker.state().is_open());
        assert_eq!(breaker.metrics().times_opened, 1);

        match breaker.can_call() {
            Err(FetchError::CircuitOpen { remaining, .. }) => {
                assert_eq!(remaining, Duration::from_secs(60));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(breaker.can_call().unwrap(), Admission::FirstProbe);
        assert!(breaker.state().is_half_open());

        breaker.record_success();
        let state = breaker.state();
        assert!(state.is_closed());
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(breaker.metrics().times_closed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_reported_while_open() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_failure_threshold(1));
        breaker.record_failure();

        tokio::time::advance(Duration::from_secs(18)).await;

        let err = breaker.can_call().unwrap_err();
        assert!(err.to_string().contains("cooldown_42s"), "{err}");
        assert_eq!(breaker.metrics().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_limit() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_half_open_max_calls(2),
        );
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(60)).await;

        // The transition call itself is not counted.
        assert_eq!(breaker.can_call().unwrap(), Admission::FirstProbe);
        assert_eq!(breaker.can_call().unwrap(), Admission::Probe);
        assert_eq!(breaker.can_call().unwrap(), Admission::Probe);
        assert!(matches!(
            breaker.can_call(),
            Err(FetchError::CircuitHalfOpenExhausted { .. })
        ));
    }

    fn half_open_breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
        let breaker = CircuitBreaker::new(config.with_failure_threshold(1));
        breaker.record_failure();
        breaker
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_guard_releases_probe_slot() {
        let breaker = half_open_breaker(CircuitBreakerConfig::default().with_half_open_max_calls(1));
        tokio::time::advance(Duration::from_secs(60)).await;

        let first = breaker.admit().unwrap();
        assert_eq!(first.admission(), Admission::FirstProbe);
        drop(first);

        let probe = breaker.admit().unwrap();
        assert_eq!(probe.admission(), Admission::Probe);
        assert!(matches!(
            breaker.can_call(),
            Err(FetchError::CircuitHalfOpenExhausted { .. })
        ));

        drop(probe);
        assert_eq!(breaker.state().half_open_calls, 0);
        assert_eq!(breaker.admit().unwrap().admission(), Admission::Probe);
        assert!(breaker.state().is_half_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_guard_resolves_probe() {
        let breaker = half_open_breaker(CircuitBreakerConfig::default());
        tokio::time::advance(Duration::from_secs(60)).await;
        let _first = breaker.admit().unwrap();

        let probe = breaker.admit().unwrap();
        assert!(probe.record(&FetchReason::FallbackOk));
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.state().half_open_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_outcome_releases_probe_slot() {
        let breaker = half_open_breaker(
            CircuitBreakerConfig::default()
                .with_half_open_max_calls(1)
                .with_failure_policy(FailurePolicy::provider_errors_only()),
        );
        tokio::time::advance(Duration::from_secs(60)).await;
        let _first = breaker.admit().unwrap();

        for _ in 0..5 {
            let probe = breaker.admit().unwrap();
            assert!(!probe.record(&FetchReason::FallbackExhausted));
        }
        assert!(breaker.state().is_half_open());
        assert_eq!(breaker.state().half_open_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_probes_expire_after_cooldown() {
        let breaker = half_open_breaker(
            CircuitBreakerConfig::default()
                .with_half_open_max_calls(1)
                .with_cooldown(Duration::from_secs(10)),
        );
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(breaker.can_call().unwrap(), Admission::FirstProbe);
        assert_eq!(breaker.can_call().unwrap(), Admission::Probe);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(matches!(
            breaker.can_call(),
            Err(FetchError::CircuitHalfOpenExhausted { .. })
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(breaker.can_call().unwrap(), Admission::Probe);
        assert!(matches!(
            breaker.can_call(),
            Err(FetchError::CircuitHalfOpenExhausted { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_failure_threshold(2));
        breaker.record_failure();
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(breaker.can_call().is_ok());

        breaker.record_failure();
        let state = breaker.state();
        assert!(state.is_open());
        assert_eq!(state.half_open_calls, 0);
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(breaker.metrics().times_opened, 2);
        assert!(breaker.can_call().is_err());
    }

    #[tokio::test]
    async fn test_success_resets_failures_when_closed() {
        let breaker = CircuitBreaker::with_defaults();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state().consecutive_failures, 2);

        breaker.record_success();
        assert_eq!(breaker.state().consecutive_failures, 0);
        assert!(breaker.state().is_closed());
    }

    #[tokio::test]
    async fn test_record_reason_uses_policy() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_failure_threshold(2));
        breaker.record_reason(&FetchReason::FallbackProviderError);
        breaker.record_reason(&FetchReason::Status(500));
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.state().consecutive_failures, 1);

        breaker.record_reason(&FetchReason::FallbackExhausted);
        assert!(breaker.state().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default().with_name("firecrawl"));
        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_threshold, 5);
        assert_eq!(status.cooldown_secs, 60);
        assert!(status.seconds_since_last_failure.is_none());

        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(3)).await;
        let status = breaker.status();
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.seconds_since_last_failure, Some(3.0));
        assert_eq!(status.metrics.failures, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "closed");
        assert_eq!(json["name"], "firecrawl");
    }

    #[tokio::test]
    async fn test_force_open_and_reset() {
        let breaker = CircuitBreaker::with_defaults();
        breaker.force_open();
        assert!(breaker.state().is_open());
        assert!(matches!(breaker.can_call(), Err(FetchError::CircuitOpen { .. })));

        breaker.reset();
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.metrics(), BreakerMetrics::new());
    }
}

//! Circuit breaker configuration.

use crate::core::FetchReason;
use std::time::Duration;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name of the protected dependency, used in errors and logs.
    pub name: String,

    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open after the last failure.
    pub cooldown: Duration,

    /// Maximum number of probes admitted while half-open.
    pub half_open_max_calls: u32,

    /// Which fallback outcomes count as failures.
    pub failure_policy: FailurePolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "fallback".to_string(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            half_open_max_calls: 3,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the protected dependency.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the maximum number of half-open probes.
    pub fn with_half_open_max_calls(mut self, max: u32) -> Self {
        self.half_open_max_calls = max;
        self
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// A configuration that protects the provider budget aggressively.
    ///
    /// - opens after 3 failures
    /// - stays open for 5 minutes
    /// - admits a single probe
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(300),
            half_open_max_calls: 1,
            ..Self::default()
        }
    }

    /// A configuration that favors availability over cost.
    pub fn high_availability() -> Self {
        Self {
            failure_threshold: 10,
            cooldown: Duration::from_secs(15),
            half_open_max_calls: 5,
            ..Self::default()
        }
    }
}

/// Defines which fallback outcomes count as failures for the breaker.
#[derive(Debug, Clone)]
pub struct FailurePolicy {
    /// Count `fallback_provider_error` as a failure.
    pub count_provider_errors: bool,
    /// Count `fallback_exhausted` (rate limit or timeout after retry).
    pub count_exhausted: bool,
    /// Count every non-success reason.
    pub count_all_errors: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            count_provider_errors: true,
            count_exhausted: true,
            count_all_errors: false,
        }
    }
}

impl FailurePolicy {
    /// Creates a new failure policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that counts every non-success reason.
    pub fn all_errors() -> Self {
        Self {
            count_all_errors: true,
            ..Self::default()
        }
    }

    /// Creates a policy where provider throttling never opens the circuit.
    pub fn provider_errors_only() -> Self {
        Self {
            count_provider_errors: true,
            count_exhausted: false,
            count_all_errors: false,
        }
    }

    /// Determines if a fallback reason should be counted as a failure.
    pub fn should_count(&self, reason: &FetchReason) -> bool {
        if reason.is_fallback_success() {
            return false;
        }
        if self.count_all_errors {
            return true;
        }

        match reason {
            FetchReason::FallbackProviderError => self.count_provider_errors,
            FetchReason::FallbackExhausted => self.count_exhausted,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.half_open_max_calls, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_name("firecrawl")
            .with_failure_threshold(10)
            .with_cooldown(Duration::from_secs(90));

        assert_eq!(config.name, "firecrawl");
        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.cooldown, Duration::from_secs(90));
    }

    #[test]
    fn test_failure_policy() {
        let policy = FailurePolicy::default();
        assert!(policy.should_count(&FetchReason::FallbackProviderError));
        assert!(policy.should_count(&FetchReason::FallbackExhausted));
        assert!(!policy.should_count(&FetchReason::FallbackOk));
        assert!(!policy.should_count(&FetchReason::Status(500)));

        let lenient = FailurePolicy::provider_errors_only();
        assert!(!lenient.should_count(&FetchReason::FallbackExhausted));

        let strict = FailurePolicy::all_errors();
        assert!(strict.should_count(&FetchReason::Status(500)));
        assert!(!strict.should_count(&FetchReason::FallbackPrecheckOk));
    }
}

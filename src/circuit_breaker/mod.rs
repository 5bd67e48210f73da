//! Circuit breaker guarding the paid render provider.
//!
//! The breaker stops calling a failing provider for a cooldown period and
//! then probes it with a handful of calls to detect recovery, capping the
//! money spent on a provider that is down.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: The provider is failing; calls are denied immediately.
//! - **Half-Open**: Probing the provider to see if it has recovered.
//!
//! ## Usage
//!
//! ```rust
//! use pagebridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use pagebridge::FetchReason;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::default()
//!         .with_name("firecrawl")
//!         .with_failure_threshold(5)
//!         .with_cooldown(Duration::from_secs(60)),
//! );
//!
//! if let Ok(probe) = breaker.admit() {
//!     // call the provider, then report
//!     probe.record(&FetchReason::FallbackOk);
//! };
//! ```

mod breaker;
mod config;
mod state;

pub use breaker::{Admission, CircuitBreaker, ProbeGuard};
pub use config::{CircuitBreakerConfig, FailurePolicy};
pub use state::{BreakerMetrics, BreakerState, BreakerStatus, CircuitState};

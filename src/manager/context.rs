//! Process-wide shared fetch state.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::manager::locks::FetchLockRegistry;

use std::sync::Arc;

/// State shared by every [`PageFetcher`](super::PageFetcher) in a process:
/// the provider circuit breaker and the per-URL lock registry.
///
/// Build one at startup and hand clones to each fetcher; clones share
/// the same breaker and registry.
#[derive(Debug, Clone)]
pub struct FetchContext {
    breaker: Arc<CircuitBreaker>,
    locks: Arc<FetchLockRegistry>,
}

impl FetchContext {
    /// Creates a context with a breaker built from `config`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breaker: Arc::new(CircuitBreaker::new(config)),
            locks: Arc::new(FetchLockRegistry::new()),
        }
    }

    /// The provider circuit breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// The per-URL lock registry.
    pub fn locks(&self) -> &Arc<FetchLockRegistry> {
        &self.locks
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let context = FetchContext::default();
        let clone = context.clone();
        assert!(Arc::ptr_eq(context.breaker(), clone.breaker()));
        assert!(Arc::ptr_eq(context.locks(), clone.locks()));
    }
}

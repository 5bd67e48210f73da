//! Error types for the pagebridge library.
//!
//! `FetchError` describes why a single step of page acquisition failed.
//! It is internal plumbing: the public `PageFetcher::fetch` boundary
//! converts every error into a [`FetchResult`](crate::core::FetchResult)
//! carrying a reason code, so callers never see these values raised.

use std::time::Duration;
use thiserror::Error;

/// The main error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The input could not be parsed as a URL.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The URL targets a host the SSRF guard refuses to contact.
    #[error("URL blocked by SSRF protection: {reason}")]
    SsrfBlocked {
        /// Human-readable reason naming the blocked host or range.
        reason: String,
    },

    /// The remote side asked us to slow down.
    #[error("rate limited by '{source_name}': retry after {retry_after:?}")]
    RateLimited {
        /// Who rate limited us (a host or a provider name).
        source_name: String,
        /// Suggested wait time before retry.
        retry_after: Option<Duration>,
    },

    /// The request timed out.
    #[error("request to '{target}' timed out after {elapsed:?}")]
    Timeout {
        /// URL or provider that timed out.
        target: String,
        /// The per-attempt timeout that elapsed.
        elapsed: Duration,
    },

    /// Connecting or reading the response failed.
    #[error("connection to '{target}' failed: {message}")]
    ConnectionFailed {
        /// URL or provider.
        target: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The redirect chain exceeded the configured limit.
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects {
        /// Configured maximum.
        limit: usize,
    },

    /// The render provider reported an error.
    #[error("render provider '{provider}' failed: {message}")]
    ProviderError {
        /// Name of the provider.
        provider: String,
        /// Error message.
        message: String,
    },

    /// The circuit breaker is open.
    #[error("circuit open for '{engine}': cooldown_{}s", .remaining.as_secs())]
    CircuitOpen {
        /// Name of the protected dependency.
        engine: String,
        /// Time left before a probe is allowed.
        remaining: Duration,
    },

    /// The circuit is half-open and all probes are in flight.
    #[error("circuit half-open for '{engine}': probe limit reached")]
    CircuitHalfOpenExhausted {
        /// Name of the protected dependency.
        engine: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl FetchError {
    /// Returns `true` if this error is transient and may succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ConnectionFailed { .. }
                | Self::RateLimited { .. }
                | Self::CircuitOpen { .. }
        )
    }

    /// Returns `true` for rate-limit errors.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Creates an `InvalidUrl` error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `SsrfBlocked` error.
    pub fn ssrf_blocked(reason: impl Into<String>) -> Self {
        Self::SsrfBlocked {
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(target: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            elapsed,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a `ProviderError` error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_is_recoverable() {
        let timeout = FetchError::timeout("https://example.com/", Duration::from_secs(15));
        assert!(timeout.is_recoverable());

        let blocked = FetchError::ssrf_blocked("Blocked hostname: localhost");
        assert!(!blocked.is_recoverable());
    }

    #[test]
    fn test_retry_after() {
        let err = FetchError::RateLimited {
            source_name: "example.com".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(FetchError::internal("x").retry_after(), None);
    }

    #[test]
    fn test_circuit_open_display_carries_cooldown() {
        let err = FetchError::CircuitOpen {
            engine: "firecrawl".into(),
            remaining: Duration::from_secs(42),
        };
        assert!(err.to_string().contains("cooldown_42s"));
    }
}

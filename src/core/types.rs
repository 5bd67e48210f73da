//! Core types used throughout the pagebridge library.
//!
//! This module defines the fetch method tag, the structured reason codes
//! that explain every fetch outcome, and per-call fetch options.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Tier-1 plain HTTP GET.
    Direct,
    /// Tier-2 fallback (pre-check or paid headless render).
    Fallback,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A structured tag explaining why a fetch succeeded, was insufficient,
/// or failed.
///
/// Reason codes serialize as their snake_case string form, with HTTP
/// statuses rendered as `status_<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchReason {
    /// Direct fetch returned a usable 200 body.
    Ok,
    /// The URL was rejected before any network call.
    SsrfBlocked,
    /// The target kept answering 429 until the retry budget ran out.
    RateLimited,
    /// Every attempt timed out.
    Timeout,
    /// A non-retryable transport failure.
    TransportError,
    /// A non-200 HTTP status.
    Status(u16),
    /// A small 200 body carrying a bot-challenge signature.
    BlockedChallenge,
    /// The fallback breaker is open and cooling down.
    CircuitOpen,
    /// The fallback breaker is half-open and all probes are taken.
    CircuitHalfOpenExhausted,
    /// The fallback's cheap pre-check produced usable content.
    FallbackPrecheckOk,
    /// The render provider returned content.
    FallbackOk,
    /// The render provider returned a PDF.
    FallbackPdf,
    /// The render provider returned a script-heavy rendered page.
    FallbackRenderedJs,
    /// The render provider failed or is not configured.
    FallbackProviderError,
    /// The render provider kept rate limiting or timing out.
    FallbackExhausted,
    /// An unexpected internal failure was caught at the boundary.
    InternalError,
}

impl FetchReason {
    /// Returns `true` for reasons produced by a circuit-breaker denial.
    pub fn is_circuit_denial(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::CircuitHalfOpenExhausted)
    }

    /// Returns `true` if the fallback tier delivered real content.
    pub fn is_fallback_success(&self) -> bool {
        matches!(
            self,
            Self::FallbackPrecheckOk | Self::FallbackOk | Self::FallbackPdf | Self::FallbackRenderedJs
        )
    }

    /// Returns `true` if the paid render provider failed.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::FallbackProviderError | Self::FallbackExhausted)
    }
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::SsrfBlocked => "ssrf_blocked",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::Status(code) => return write!(f, "status_{code}"),
            Self::BlockedChallenge => "blocked_challenge",
            Self::CircuitOpen => "circuit_open",
            Self::CircuitHalfOpenExhausted => "circuit_half_open_exhausted",
            Self::FallbackPrecheckOk => "fallback_precheck_ok",
            Self::FallbackOk => "fallback_ok",
            Self::FallbackPdf => "fallback_pdf",
            Self::FallbackRenderedJs => "fallback_rendered_js",
            Self::FallbackProviderError => "fallback_provider_error",
            Self::FallbackExhausted => "fallback_exhausted",
            Self::InternalError => "internal_error",
        };
        f.write_str(name)
    }
}

impl FromStr for FetchReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reason = match s {
            "ok" => Self::Ok,
            "ssrf_blocked" => Self::SsrfBlocked,
            "rate_limited" => Self::RateLimited,
            "timeout" => Self::Timeout,
            "transport_error" => Self::TransportError,
            "blocked_challenge" => Self::BlockedChallenge,
            "circuit_open" => Self::CircuitOpen,
            "circuit_half_open_exhausted" => Self::CircuitHalfOpenExhausted,
            "fallback_precheck_ok" => Self::FallbackPrecheckOk,
            "fallback_ok" => Self::FallbackOk,
            "fallback_pdf" => Self::FallbackPdf,
            "fallback_rendered_js" => Self::FallbackRenderedJs,
            "fallback_provider_error" => Self::FallbackProviderError,
            "fallback_exhausted" => Self::FallbackExhausted,
            "internal_error" => Self::InternalError,
            other => {
                let code = other
                    .strip_prefix("status_")
                    .and_then(|code| code.parse::<u16>().ok())
                    .ok_or_else(|| format!("unknown fetch reason: {other}"))?;
                Self::Status(code)
            }
        };
        Ok(reason)
    }
}

impl Serialize for FetchReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FetchReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-call options for [`PageFetcher`](crate::manager::PageFetcher).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the direct tier and go straight to the fallback.
    pub force_fallback: bool,
}

impl FetchOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the fallback tier.
    pub fn with_force_fallback(mut self, force: bool) -> Self {
        self.force_fallback = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        assert_eq!(FetchReason::Ok.to_string(), "ok");
        assert_eq!(FetchReason::Status(404).to_string(), "status_404");
        assert_eq!(
            FetchReason::CircuitHalfOpenExhausted.to_string(),
            "circuit_half_open_exhausted"
        );
    }

    #[test]
    fn test_reason_parse() {
        assert_eq!("status_503".parse::<FetchReason>(), Ok(FetchReason::Status(503)));
        assert_eq!("fallback_pdf".parse::<FetchReason>(), Ok(FetchReason::FallbackPdf));
        assert!("status_abc".parse::<FetchReason>().is_err());
        assert!("bogus".parse::<FetchReason>().is_err());
    }

    #[test]
    fn test_reason_serializes_as_string() {
        let json = serde_json::to_string(&FetchReason::Status(429)).unwrap();
        assert_eq!(json, "\"status_429\"");
        let back: FetchReason = serde_json::from_str("\"blocked_challenge\"").unwrap();
        assert_eq!(back, FetchReason::BlockedChallenge);
    }

    #[test]
    fn test_reason_groups() {
        assert!(FetchReason::CircuitOpen.is_circuit_denial());
        assert!(FetchReason::FallbackRenderedJs.is_fallback_success());
        assert!(FetchReason::FallbackExhausted.is_provider_failure());
        assert!(!FetchReason::FallbackOk.is_provider_failure());
    }
}

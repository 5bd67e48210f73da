//! Audit event types and emission functions.

use crate::circuit_breaker::CircuitState;
use crate::core::FetchResult;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a finished page acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Unique fetch ID.
    pub fetch_id: String,

    /// URL as supplied by the caller.
    pub requested_url: String,

    /// Canonical URL that was fetched.
    pub normalized_url: String,

    /// URL that produced the body.
    pub final_url: String,

    /// Tier that produced the result.
    pub method: Option<String>,

    /// Reason code.
    pub reason: String,

    /// HTTP status, if any.
    pub status_code: Option<u16>,

    /// Body size in bytes.
    pub body_bytes: usize,

    /// Number of redirects followed.
    pub redirects: usize,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Error message, if the fetch produced no usable content.
    pub error: Option<String>,
}

impl FetchAuditEvent {
    /// Builds the event for `result`.
    pub fn from_result(fetch_id: &str, result: &FetchResult, duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            fetch_id: fetch_id.to_string(),
            requested_url: result.requested_url.clone(),
            normalized_url: result.normalized_url.clone(),
            final_url: result.final_url.clone(),
            method: result.method.map(|m| m.to_string()),
            reason: result.reason.to_string(),
            status_code: result.status_code,
            body_bytes: result.html.len(),
            redirects: result.redirect_count(),
            duration_ms: duration.as_millis() as u64,
            error: result.error.clone(),
        }
    }
}

impl AuditEvent for FetchAuditEvent {
    fn event_type(&self) -> &'static str {
        "fetch_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a circuit breaker changing position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Name of the protected dependency.
    pub breaker: String,

    /// Previous state.
    pub from: CircuitState,

    /// New state.
    pub to: CircuitState,

    /// Consecutive failures at the time of the transition.
    pub consecutive_failures: u32,
}

impl AuditEvent for CircuitAuditEvent {
    fn event_type(&self) -> &'static str {
        "circuit_transition"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a fetch starting.
pub fn emit_fetch_started(fetch_id: &str, requested_url: &str, force_fallback: bool) {
    tracing::info!(
        target: "pagebridge::audit",
        event_type = "fetch_started",
        fetch_id = %fetch_id,
        requested_url = %requested_url,
        force_fallback = force_fallback,
        "Fetch started"
    );
}

/// Emits an audit event for a completed fetch.
pub fn emit_fetch_completed(event: &FetchAuditEvent) {
    tracing::info!(
        target: "pagebridge::audit",
        event_type = event.event_type(),
        fetch_id = %event.fetch_id,
        requested_url = %event.requested_url,
        normalized_url = %event.normalized_url,
        final_url = %event.final_url,
        method = ?event.method,
        reason = %event.reason,
        status_code = ?event.status_code,
        body_bytes = event.body_bytes,
        redirects = event.redirects,
        duration_ms = event.duration_ms,
        error = ?event.error,
        "Fetch completed"
    );
}

/// Emits an audit event for a URL refused by the SSRF guard.
pub fn emit_ssrf_blocked(fetch_id: &str, url: &str, reason: &str) {
    tracing::warn!(
        target: "pagebridge::audit",
        event_type = "ssrf_blocked",
        fetch_id = %fetch_id,
        url = %url,
        reason = %reason,
        "URL blocked by SSRF protection"
    );
}

/// Emits an audit event for a circuit breaker transition.
pub fn emit_circuit_transition(event: &CircuitAuditEvent) {
    tracing::info!(
        target: "pagebridge::audit",
        event_type = event.event_type(),
        breaker = %event.breaker,
        from = %event.from,
        to = %event.to,
        consecutive_failures = event.consecutive_failures,
        "Circuit breaker transition"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FetchMethod, FetchReason};

    #[test]
    fn test_fetch_event_from_result() {
        let result = FetchResult::new("example.com", "https://example.com/", FetchReason::Ok)
            .with_method(FetchMethod::Direct)
            .with_status(200)
            .with_html("<html></html>")
            .with_redirect_chain(vec!["https://example.com/old".into()]);

        let event = FetchAuditEvent::from_result("abc", &result, Duration::from_millis(1500));

        assert_eq!(event.event_type(), "fetch_completed");
        assert_eq!(event.method.as_deref(), Some("direct"));
        assert_eq!(event.reason, "ok");
        assert_eq!(event.body_bytes, 13);
        assert_eq!(event.redirects, 1);
        assert_eq!(event.duration_ms, 1500);
    }

    #[test]
    fn test_circuit_event_serializes() {
        let event = CircuitAuditEvent {
            timestamp: Utc::now(),
            breaker: "firecrawl".into(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            consecutive_failures: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["from"], "closed");
        assert_eq!(json["to"], "open");
        assert_eq!(event.event_type(), "circuit_transition");
    }
}

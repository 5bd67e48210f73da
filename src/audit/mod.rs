//! Structured audit logging.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate on the `pagebridge::audit` target. Events can
//! be captured by any tracing subscriber (JSON file, OpenTelemetry, etc.)
//! to keep a record of every URL the service was asked to contact.

mod events;

pub use events::{
    emit_circuit_transition, emit_fetch_completed, emit_fetch_started, emit_ssrf_blocked,
    AuditEvent, CircuitAuditEvent, FetchAuditEvent,
};

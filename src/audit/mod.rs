//! Structured audit logging.
//!
//! Scan lifecycle and batch events are emitted with `tracing` under the
//! `scanrelay::audit` target, so any subscriber (JSON file, OpenTelemetry,
//! etc.) can route them separately from diagnostic logs.

mod events;

pub use events::{
    emit_analysis_completed, emit_contribution, emit_report_normalized, emit_scan_started,
    emit_status_polled, AuditEventKind, AUDIT_TARGET,
};

//! Audit event types and emission functions.

use crate::batch::{AnalysisResult, ContributionOutcome};
use crate::core::ScanJob;
use crate::report::Report;

use serde::Serialize;
use std::fmt;

/// Tracing target shared by every audit event.
pub const AUDIT_TARGET: &str = "scanrelay::audit";

/// Kinds of audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A scan was created and started on the manager.
    ScanStarted,
    /// A task status was queried.
    StatusPolled,
    /// A report was fetched and normalized.
    ReportNormalized,
    /// A batch contribution was received.
    ContributionRecorded,
    /// A batch analysis finished.
    AnalysisCompleted,
}

impl AuditEventKind {
    /// Returns the event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanStarted => "scan_started",
            Self::StatusPolled => "status_polled",
            Self::ReportNormalized => "report_normalized",
            Self::ContributionRecorded => "contribution_recorded",
            Self::AnalysisCompleted => "analysis_completed",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits an audit event for a scan that was started.
pub fn emit_scan_started(target: &str, job: &ScanJob) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventKind::ScanStarted,
        scan_target = %target,
        scan_name = %job.scan_name,
        target_id = %job.target_id,
        task_id = %job.task_id,
        "Scan started"
    );
}

/// Emits an audit event for a status query.
pub fn emit_status_polled(job: &ScanJob) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventKind::StatusPolled,
        task_id = %job.task_id,
        status = %job.status,
        progress = job.progress,
        report_id = ?job.report_id,
        "Task status polled"
    );
}

/// Emits an audit event for a normalized report.
pub fn emit_report_normalized(report: &Report) {
    let summary = &report.summary;
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventKind::ReportNormalized,
        report_id = %report.report_id,
        task_id = %report.metadata.task_id,
        scan_run_status = %report.scan_run_status,
        total_vulns = summary.total_vulns,
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
        max_severity = summary.max_severity,
        "Report normalized"
    );
}

/// Emits an audit event for a batch contribution.
pub fn emit_contribution(batch_id: &str, owner_id: &str, source: &str, outcome: &ContributionOutcome) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventKind::ContributionRecorded,
        batch_id = %batch_id,
        owner_id = %owner_id,
        source = %source,
        outcome = %outcome.as_str(),
        "Batch contribution received"
    );
}

/// Emits an audit event for a finished batch analysis.
pub fn emit_analysis_completed(batch_id: &str, owner_id: &str, result: &AnalysisResult) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventKind::AnalysisCompleted,
        batch_id = %batch_id,
        owner_id = %owner_id,
        analysis_id = %result.analysis_id,
        source_count = result.sources.len(),
        risk_score = result.risk_score,
        "Batch analysis completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(AuditEventKind::ScanStarted.as_str(), "scan_started");
        assert_eq!(
            serde_json::to_string(&AuditEventKind::AnalysisCompleted).unwrap(),
            "\"analysis_completed\""
        );
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let job = ScanJob::new("Scan-10.0.0.1-20240101-000000");
        emit_scan_started("10.0.0.1", &job);
        emit_status_polled(&job);
        emit_report_normalized(&Report::default());
    }
}

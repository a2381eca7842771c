//! The normalized report schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A normalized scan report.
///
/// Derived once from a single `<get_reports_response>` and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report identifier.
    pub report_id: String,

    /// Scan run status as reported by the manager (e.g. "Done").
    pub scan_run_status: String,

    /// Task, target and timing metadata.
    pub metadata: ReportMetadata,

    /// Aggregate counts and severities.
    pub summary: Summary,

    /// Open ports.
    pub ports: Vec<PortEntry>,

    /// Findings.
    pub vulnerabilities: Vec<Vulnerability>,

    /// Per-host scan errors.
    pub errors: Vec<ErrorEntry>,
}

impl Report {
    /// Returns `true` if the report carries no findings, ports or errors.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.vulnerabilities.is_empty() && self.errors.is_empty()
    }

    /// Returns findings at or above the given score.
    pub fn findings_at_least(&self, score: f64) -> impl Iterator<Item = &Vulnerability> {
        self.vulnerabilities
            .iter()
            .filter(move |v| v.severity_score >= score)
    }
}

/// Identifying metadata of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Task identifier.
    pub task_id: String,
    /// Task name.
    pub task_name: String,
    /// Target identifier.
    pub target_id: String,
    /// Target name.
    pub target_name: String,
    /// Scan start time as reported.
    pub scan_start: String,
    /// Scan end time as reported.
    pub scan_end: String,
    /// Manager timezone.
    pub timezone: String,
    /// GMP version of the manager that produced the report.
    pub gmp_version: String,
}

/// Summary counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Hosts scanned.
    pub total_hosts: u64,
    /// Open ports found.
    pub total_ports: u64,
    /// Findings listed.
    pub total_vulns: u64,
    /// High-severity findings.
    pub high: u64,
    /// Medium-severity findings.
    pub medium: u64,
    /// Low-severity findings.
    pub low: u64,
    /// Log-level findings.
    pub log: u64,
    /// Legacy "warning" findings.
    pub warning: u64,
    /// Legacy "info" findings.
    pub info: u64,
    /// Findings overridden as false positives.
    pub false_positives: u64,
    /// Scan errors.
    pub total_errors: u64,
    /// Highest finding score.
    pub max_severity: f64,
    /// Mean finding score.
    pub avg_severity: f64,
}

/// An open port on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    /// Host address.
    pub host: String,
    /// Port text as reported, e.g. `443/tcp`.
    pub port: String,
    /// Protocol part of the port text.
    pub protocol: String,
    /// Threat label attached to the port.
    pub threat: String,
}

/// A single finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Result identifier.
    pub id: String,
    /// Result name.
    pub name: String,
    /// Host address.
    pub host: String,
    /// Host name, when resolved.
    pub hostname: String,
    /// Port text.
    pub port: String,
    /// Numeric severity, 0.0 when unparsable.
    pub severity_score: f64,
    /// Threat label (High, Medium, Low, Log, ...).
    pub threat_label: String,
    /// Quality of detection, 0-100.
    pub qod: u32,
    /// Result description.
    pub description: String,
    /// The test that produced the finding.
    pub nvt: Nvt,
    /// Creation time as reported.
    pub creation_time: String,
    /// Modification time as reported.
    pub modification_time: String,
}

/// Network vulnerability test details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nvt {
    /// Test OID.
    pub oid: String,
    /// Test name.
    pub name: String,
    /// Test family.
    pub family: String,
    /// CVSS base score text.
    pub cvss_base: String,
    /// Parsed `key=value` tags.
    pub tags: BTreeMap<String, String>,
    /// Remediation text.
    pub solution: String,
    /// CVE identifiers.
    pub cve_refs: Vec<String>,
    /// Bugtraq identifiers.
    pub bid_refs: Vec<String>,
    /// CERT advisory identifiers.
    pub cert_refs: Vec<String>,
    /// Other references (URLs and advisories).
    pub xrefs: Vec<String>,
}

/// A scan error on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Host address.
    pub host: String,
    /// Port text.
    pub port: String,
    /// Error description.
    pub description: String,
    /// OID of the test that failed.
    pub nvt_oid: String,
    /// Name of the test that failed.
    pub nvt_name: String,
}

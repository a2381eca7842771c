//! Core types used throughout the scanrelay library.
//!
//! This module defines the orchestrated scan job, its remote status and the
//! workflow phase it has reached.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a scan task as reported by the manager.
///
/// Known remote statuses are normalized. Anything else is kept as a
/// lower-cased pass-through so callers never lose information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Requested or queued, not yet running.
    Queued,
    /// The scan is in progress.
    Running,
    /// The scan finished.
    Completed,
    /// The scan was stopped.
    Stopped,
    /// The scan ended in error.
    Error,
    /// Any other remote status, lower-cased.
    Other(String),
}

impl JobStatus {
    /// Maps a remote status string onto the normalized vocabulary.
    pub fn from_remote(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "requested" | "queued" => Self::Queued,
            "running" => Self::Running,
            "done" | "completed" => Self::Completed,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            _ => Self::Other(lowered),
        }
    }

    /// Returns the normalized status string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` if no further progress will be made.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        Self::from_remote(&value)
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow phase of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobPhase {
    /// Nothing has been sent to the manager yet.
    Created,
    /// The target exists on the manager.
    TargetCreated,
    /// The task exists on the manager.
    TaskCreated,
    /// The task was started.
    Started,
    /// The task is being polled.
    Polling,
    /// Terminal: the scan finished.
    Completed,
    /// Terminal: the scan was stopped.
    Stopped,
    /// Terminal: the scan failed.
    Error,
}

impl JobPhase {
    /// Returns `true` for terminal phases.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    /// Phase reached after observing the given remote status.
    pub fn after_status(status: &JobStatus) -> Self {
        match status {
            JobStatus::Completed => Self::Completed,
            JobStatus::Stopped => Self::Stopped,
            JobStatus::Error => Self::Error,
            _ => Self::Polling,
        }
    }
}

/// One orchestrated scan.
///
/// Identifiers are allocated by the manager and treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    /// Target identifier, empty when the manager did not echo it.
    pub target_id: String,

    /// Task identifier.
    pub task_id: String,

    /// Generated scan name.
    pub scan_name: String,

    /// Normalized remote status.
    pub status: JobStatus,

    /// Progress percentage, always within 0..=100.
    pub progress: u8,

    /// Report identifier, once the manager has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,

    /// Workflow phase.
    pub phase: JobPhase,
}

impl ScanJob {
    /// Creates a job in the `created` phase.
    pub fn new(scan_name: impl Into<String>) -> Self {
        Self {
            target_id: String::new(),
            task_id: String::new(),
            scan_name: scan_name.into(),
            status: JobStatus::Queued,
            progress: 0,
            report_id: None,
            phase: JobPhase::Created,
        }
    }

    /// Returns `true` once the scan has finished successfully.
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Normalizes a raw progress value.
///
/// Negative values (the manager reports `-1` while waiting) become 0, values
/// above 100 are capped and unparsable text counts as 0.
pub fn clamp_progress(raw: &str) -> u8 {
    match raw.trim().parse::<i64>() {
        Ok(p) => p.clamp(0, 100) as u8,
        Err(_) => 0,
    }
}

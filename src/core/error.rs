//! Error types for the scanrelay library.
//!
//! Every failure surfaces as a typed error; nothing in the library panics on
//! bad input or a misbehaving backend. Each error exposes an [`ErrorKind`] so
//! the routing layer can tell the failure classes apart without matching on
//! messages.

use std::fmt;
use thiserror::Error;

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The control program failed or could not be reached.
    Transport,
    /// The endpoint or the fallback configuration could not be resolved.
    Configuration,
    /// A well-formed-looking response lacked an expected identifier or field.
    ProtocolExtraction,
    /// A response envelope could not be decoded.
    Parse,
    /// The identifier belongs to a different caller.
    Ownership,
    /// Unknown batch, task or report.
    NotFound,
    /// A required input was missing or empty.
    Validation,
    /// No caller identity was supplied.
    Unauthenticated,
    /// The caller's deadline expired or was cancelled.
    Timeout,
}

impl ErrorKind {
    /// Returns a stable snake_case name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Configuration => "configuration",
            Self::ProtocolExtraction => "protocol_extraction",
            Self::Parse => "parse",
            Self::Ownership => "ownership",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Timeout => "timeout",
        }
    }

    /// Suggested HTTP status for the routing layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Unauthenticated => 401,
            Self::Ownership => 403,
            Self::NotFound => 404,
            Self::Configuration => 500,
            Self::Transport | Self::ProtocolExtraction | Self::Parse => 502,
            Self::Timeout => 504,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure while executing a protocol command through the control program.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The control program exited unsuccessfully with a non-transient error.
    #[error("command '{program}' failed (exit code {exit_code:?}): {output}")]
    CommandFailed {
        /// Program that was invoked.
        program: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Combined stdout/stderr of the process.
        output: String,
    },

    /// Every attempt failed with a transient connectivity error.
    #[error("command '{program}' still failing after {attempts} attempts: {output}")]
    RetriesExhausted {
        /// Program that was invoked.
        program: String,
        /// Number of attempts made.
        attempts: u32,
        /// Output of the last attempt.
        output: String,
    },

    /// The control program could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Neither the socket nor the containerized fallback could be resolved.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what could not be resolved.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the command completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl TransportError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the process output carried by this error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } | Self::RetriesExhausted { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }

    /// Returns `true` if the caller's deadline or cancellation ended the call.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CommandFailed { .. } | Self::RetriesExhausted { .. } | Self::Spawn { .. } => {
                ErrorKind::Transport
            }
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::Timeout,
        }
    }
}

/// Failure to decode a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The output contained no `<` at all.
    #[error("response contains no XML envelope")]
    MissingEnvelope,

    /// The XML could not be decoded.
    #[error("malformed XML response: {message}")]
    Malformed {
        /// Decoder message.
        message: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(err: impl fmt::Display) -> Self {
        Self::Malformed {
            message: err.to_string(),
        }
    }
}

/// Failure of a single protocol step.
#[derive(Debug, Error)]
pub enum GmpError {
    /// The command could not be executed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response decoded but lacked an expected identifier or element.
    #[error("response is missing {field}: {output}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// The cleaned response text.
        output: String,
    },

    /// The manager answered with a non-2xx status attribute.
    #[error("request rejected with status {status}: {status_text}")]
    Rejected {
        /// Numeric GMP status.
        status: u16,
        /// Human-readable status text.
        status_text: String,
    },

    /// The response envelope was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl GmpError {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) => e.kind(),
            Self::MissingField { .. } => ErrorKind::ProtocolExtraction,
            Self::Rejected { status: 404, .. } => ErrorKind::NotFound,
            Self::Rejected { status: 400, .. } => ErrorKind::Validation,
            Self::Rejected { .. } => ErrorKind::ProtocolExtraction,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }
}

/// Failure of a scan workflow operation, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The request itself was invalid (e.g. an empty target).
    #[error("invalid request: {message}")]
    Validation {
        /// What was wrong with the request.
        message: String,
    },

    /// Creating the scan target failed.
    #[error("failed to create target: {source}")]
    TargetCreationFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },

    /// Creating the scan task failed.
    #[error("failed to create task: {source}")]
    TaskCreationFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },

    /// Starting the task failed.
    #[error("failed to start task: {source}")]
    TaskStartFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },

    /// Querying task status failed.
    #[error("failed to get task status: {source}")]
    StatusQueryFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },

    /// Fetching the report failed before normalization.
    #[error("failed to get report: {source}")]
    ReportFetchFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },

    /// The report was fetched but could not be normalized.
    ///
    /// The raw response is kept so callers can fall back to it.
    #[error("failed to parse report: {source}")]
    ReportParseFailed {
        /// Normalizer failure.
        #[source]
        source: ParseError,
        /// The cleaned response text.
        raw: String,
    },

    /// Querying the manager version failed.
    #[error("failed to get version: {source}")]
    VersionQueryFailed {
        /// Underlying step failure.
        #[source]
        source: GmpError,
    },
}

impl WorkflowError {
    /// Creates a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ReportParseFailed { .. } => ErrorKind::Parse,
            Self::TargetCreationFailed { source }
            | Self::TaskCreationFailed { source }
            | Self::TaskStartFailed { source }
            | Self::StatusQueryFailed { source }
            | Self::ReportFetchFailed { source }
            | Self::VersionQueryFailed { source } => source.kind(),
        }
    }

    /// Returns the name of the workflow step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validate",
            Self::TargetCreationFailed { .. } => "create_target",
            Self::TaskCreationFailed { .. } => "create_task",
            Self::TaskStartFailed { .. } => "start_task",
            Self::StatusQueryFailed { .. } => "get_status",
            Self::ReportFetchFailed { .. } => "get_report",
            Self::ReportParseFailed { .. } => "parse_report",
            Self::VersionQueryFailed { .. } => "get_version",
        }
    }

    /// Returns the raw report text when normalization failed.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::ReportParseFailed { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Failure of a batch aggregation operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// No caller identity accompanied the request.
    #[error("caller identity is required")]
    Unauthenticated,

    /// The batch was created by a different owner.
    #[error("batch '{batch_id}' belongs to a different owner")]
    Ownership {
        /// The batch that was accessed.
        batch_id: String,
    },

    /// No batch exists under this identifier.
    #[error("batch '{batch_id}' not found")]
    NotFound {
        /// The batch that was requested.
        batch_id: String,
    },

    /// A required input was missing.
    #[error("invalid batch request: {message}")]
    Validation {
        /// What was missing.
        message: String,
    },

    /// The aggregator could not be set up.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The analysis did not finish within the caller's wait budget.
    #[error("timed out waiting for analysis of batch '{batch_id}'")]
    AnalysisTimeout {
        /// The batch being waited on.
        batch_id: String,
    },
}

impl BatchError {
    /// Creates a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Ownership { .. } => ErrorKind::Ownership,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::AnalysisTimeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Failure of one branch of a port scan.
#[derive(Debug, Error)]
pub enum PortScanError {
    /// The scanner could not be run or exited unsuccessfully.
    #[error("{scan} scan failed: {source}")]
    Execution {
        /// Which scan failed (`tcp`, `udp`).
        scan: &'static str,
        /// Underlying failure.
        #[source]
        source: TransportError,
    },

    /// The scanner output could not be decoded.
    #[error("{scan} scan output could not be decoded: {source}")]
    Decode {
        /// Which scan failed.
        scan: &'static str,
        /// Decoder failure.
        #[source]
        source: ParseError,
    },

    /// The target was empty.
    #[error("scan target must not be empty")]
    EmptyTarget,

    /// The target looked like a scanner option.
    #[error("scan target must not start with '-': {target}")]
    InvalidTarget {
        /// The rejected target.
        target: String,
    },
}

impl PortScanError {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Execution { source, .. } => source.kind(),
            Self::Decode { .. } => ErrorKind::Parse,
            Self::EmptyTarget | Self::InvalidTarget { .. } => ErrorKind::Validation,
        }
    }

    /// Returns which scan failed, if the failure belongs to one.
    pub fn scan(&self) -> Option<&'static str> {
        match self {
            Self::Execution { scan, .. } | Self::Decode { scan, .. } => Some(scan),
            Self::EmptyTarget | Self::InvalidTarget { .. } => None,
        }
    }
}

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A specialized `Result` type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// A specialized `Result` type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// A specialized `Result` type for port scans.
pub type PortScanResult<T> = Result<T, PortScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_carries_step_context() {
        let err = WorkflowError::TargetCreationFailed {
            source: GmpError::Transport(TransportError::CommandFailed {
                program: "gvm-cli".into(),
                exit_code: Some(1),
                output: "bad credentials".into(),
            }),
        };
        assert!(err.to_string().starts_with("failed to create target"));
        assert!(err.to_string().contains("bad credentials"));
        assert_eq!(err.step(), "create_target");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_rejected_not_found_maps_to_not_found() {
        let err = WorkflowError::ReportFetchFailed {
            source: GmpError::Rejected {
                status: 404,
                status_text: "Failed to find report".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().http_status(), 404);
    }

    #[test]
    fn test_batch_error_kinds_are_distinguishable() {
        let kinds = [
            BatchError::Unauthenticated.kind(),
            BatchError::Ownership { batch_id: "b".into() }.kind(),
            BatchError::NotFound { batch_id: "b".into() }.kind(),
            BatchError::validation("missing header").kind(),
        ];
        let statuses: Vec<u16> = kinds.iter().map(ErrorKind::http_status).collect();
        assert_eq!(statuses, vec![401, 403, 404, 400]);
    }

    #[test]
    fn test_transport_error_output() {
        let err = TransportError::RetriesExhausted {
            program: "gvm-cli".into(),
            attempts: 15,
            output: "Connection refused".into(),
        };
        assert_eq!(err.output(), Some("Connection refused"));
        assert!(!err.is_interrupted());
        assert!(TransportError::Cancelled.is_interrupted());
        assert_eq!(TransportError::DeadlineExceeded.kind(), ErrorKind::Timeout);
    }
}

//! Request and response bodies for the HTTP routing layer.
//!
//! The routing layer itself lives outside this crate; these types fix the
//! JSON shapes it exchanges with clients and convert library results into
//! them.

use crate::batch::{AnalysisResult, Batch, BatchStatus, ContributionOutcome};
use crate::core::{BatchError, ErrorKind, ScanJob};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the batch identifier on contributions.
pub const BATCH_ID_HEADER: &str = "X-Batch-ID";

/// Body of the scan-start and version-target endpoints.
///
/// Scan names are always generated from the target, so any other field a
/// client sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRequest {
    /// Host or address to scan.
    pub target: String,
}

/// Response of the scan-start endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartScanResponse {
    /// Manager target identifier.
    #[serde(rename = "targetID")]
    pub target_id: String,
    /// Manager task identifier.
    #[serde(rename = "taskID")]
    pub task_id: String,
    /// Generated scan name.
    #[serde(rename = "scanName")]
    pub scan_name: String,
    /// Normalized task status.
    pub status: String,
    /// Progress, 0-100.
    pub progress: u8,
}

impl From<&ScanJob> for StartScanResponse {
    fn from(job: &ScanJob) -> Self {
        Self {
            target_id: job.target_id.clone(),
            task_id: job.task_id.clone(),
            scan_name: job.scan_name.clone(),
            status: job.status.to_string(),
            progress: job.progress,
        }
    }
}

/// Response of the task-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Manager task identifier.
    #[serde(rename = "taskID")]
    pub task_id: String,
    /// Normalized task status.
    pub status: String,
    /// Progress, 0-100.
    pub progress: u8,
    /// Report identifier, once the manager has one.
    #[serde(rename = "reportID", default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl From<&ScanJob> for TaskStatusResponse {
    fn from(job: &ScanJob) -> Self {
        Self {
            task_id: job.task_id.clone(),
            status: job.status.to_string(),
            progress: job.progress,
            report_id: job.report_id.clone(),
        }
    }
}

/// The fixed set of fan-in sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanInSource {
    /// `/a`
    ApiA,
    /// `/b`
    ApiB,
    /// `/c`
    ApiC,
    /// `/d`
    ApiD,
    /// `/e`
    ApiE,
}

impl FanInSource {
    /// Every source, in route order.
    pub const ALL: [FanInSource; 5] = [Self::ApiA, Self::ApiB, Self::ApiC, Self::ApiD, Self::ApiE];

    /// Returns the source name recorded in the batch.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiA => "api_a",
            Self::ApiB => "api_b",
            Self::ApiC => "api_c",
            Self::ApiD => "api_d",
            Self::ApiE => "api_e",
        }
    }

    /// Maps a route suffix (`a`..`e`) to its source.
    pub fn from_route(suffix: &str) -> Option<Self> {
        match suffix.trim_start_matches('/') {
            "a" => Some(Self::ApiA),
            "b" => Some(Self::ApiB),
            "c" => Some(Self::ApiC),
            "d" => Some(Self::ApiD),
            "e" => Some(Self::ApiE),
            _ => None,
        }
    }

    /// Builds the payload stored for this source.
    ///
    /// A non-null request body is stored as-is; otherwise a processing
    /// record is generated.
    pub fn payload(&self, body: Option<serde_json::Value>) -> serde_json::Value {
        match body {
            Some(body) if !body.is_null() => body,
            _ => serde_json::json!({
                "source": self.as_str(),
                "processed": true,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        }
    }
}

impl fmt::Display for FanInSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the batch identifier from the raw header value.
///
/// # Errors
///
/// `Validation` when the header is absent or blank.
pub fn batch_id_from_header(value: Option<&str>) -> Result<String, BatchError> {
    match value.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(BatchError::validation(format!("{BATCH_ID_HEADER} header is required"))),
    }
}

/// Response of a contribution endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    /// Always `received`.
    pub status: String,
    /// Source name.
    pub source: String,
    /// Batch identifier.
    pub batch_id: String,
    /// What the contribution did; not part of the client contract.
    #[serde(skip)]
    pub outcome: Option<ContributionOutcome>,
}

impl ContributionReceipt {
    /// Creates a receipt.
    ///
    /// Duplicate and late contributions are acknowledged like new ones.
    pub fn new(source: FanInSource, batch_id: impl Into<String>, outcome: ContributionOutcome) -> Self {
        Self {
            status: "received".to_string(),
            source: source.as_str().to_string(),
            batch_id: batch_id.into(),
            outcome: Some(outcome),
        }
    }
}

/// Response of the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Batch status.
    pub status: BatchStatus,
    /// Analysis result, once complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    /// Batch identifier.
    pub batch_id: String,
}

impl From<Batch> for AnalysisResponse {
    fn from(batch: Batch) -> Self {
        Self {
            status: batch.status,
            result: batch.analysis_result,
            batch_id: batch.batch_id,
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Error classification.
    pub kind: String,
    /// HTTP status to respond with.
    #[serde(skip)]
    pub status: u16,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: kind.as_str().to_string(),
            status: kind.http_status(),
        }
    }
}

macro_rules! impl_error_body {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<&$error> for ErrorBody {
                fn from(err: &$error) -> Self {
                    Self::new(err.kind(), err.to_string())
                }
            }
        )*
    };
}

impl_error_body!(
    crate::core::BatchError,
    crate::core::WorkflowError,
    crate::core::TransportError,
    crate::core::PortScanError,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;

    #[test]
    fn test_start_scan_response_field_names() {
        let mut job = ScanJob::new("Scan-10.0.0.1-20240101-000000");
        job.target_id = "t-1".into();
        job.task_id = "k-1".into();
        job.status = JobStatus::Running;

        let json = serde_json::to_value(StartScanResponse::from(&job)).unwrap();
        assert_eq!(json["targetID"], "t-1");
        assert_eq!(json["taskID"], "k-1");
        assert_eq!(json["scanName"], "Scan-10.0.0.1-20240101-000000");
        assert_eq!(json["status"], "running");
        assert_eq!(json["progress"], 0);
    }

    #[test]
    fn test_target_request_ignores_extra_fields() {
        let request: TargetRequest =
            serde_json::from_str(r#"{"target": "10.0.0.1", "name": "nightly"}"#).unwrap();
        assert_eq!(request.target, "10.0.0.1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"target": "10.0.0.1"})
        );
    }

    #[test]
    fn test_task_status_omits_missing_report() {
        let job = ScanJob::new("s");
        let json = serde_json::to_value(TaskStatusResponse::from(&job)).unwrap();
        assert!(json.get("reportID").is_none());
    }

    #[test]
    fn test_fan_in_routes() {
        assert_eq!(FanInSource::from_route("/c"), Some(FanInSource::ApiC));
        assert_eq!(FanInSource::from_route("f"), None);
        let names: Vec<&str> = FanInSource::ALL.iter().map(FanInSource::as_str).collect();
        assert_eq!(names, vec!["api_a", "api_b", "api_c", "api_d", "api_e"]);
    }

    #[test]
    fn test_payload_defaults_to_processing_record() {
        let generated = FanInSource::ApiB.payload(None);
        assert_eq!(generated["source"], "api_b");
        assert_eq!(generated["processed"], true);

        let body = serde_json::json!({"risk_score": 4});
        assert_eq!(FanInSource::ApiB.payload(Some(body.clone())), body);
    }

    #[test]
    fn test_batch_header_is_required() {
        assert_eq!(batch_id_from_header(Some(" b-1 ")).unwrap(), "b-1");
        let err = batch_id_from_header(Some("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(batch_id_from_header(None).is_err());
    }

    #[test]
    fn test_receipt_shape() {
        let receipt = ContributionReceipt::new(FanInSource::ApiA, "b-1", ContributionOutcome::Duplicate);
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json, serde_json::json!({"status": "received", "source": "api_a", "batch_id": "b-1"}));
    }

    #[test]
    fn test_error_body_from_batch_error() {
        let body = ErrorBody::from(&BatchError::Ownership { batch_id: "b".into() });
        assert_eq!(body.status, 403);
        assert_eq!(body.kind, "ownership");
    }

    #[test]
    fn test_analysis_response_while_processing() {
        let response = AnalysisResponse::from(Batch::new("b-1", "alice", 5));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("result").is_none());
    }
}

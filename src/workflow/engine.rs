//! The scan workflow engine.

use crate::core::{
    clamp_progress, ArcTransport, Deadline, GmpError, JobPhase, JobStatus, ScanJob, Transport,
    WorkflowError, WorkflowResult,
};
use crate::report::{self, Report};
use crate::workflow::commands;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Port list "All IANA assigned TCP".
pub const DEFAULT_PORT_LIST_ID: &str = "33d0cd82-57c6-11e1-8ed1-406186ea4fc5";

/// Scan config "Full and fast".
pub const DEFAULT_SCAN_CONFIG_ID: &str = "daba56c8-73ec-11df-a475-002264764cea";

/// The default OpenVAS scanner.
pub const DEFAULT_SCANNER_ID: &str = "08b69003-5fc2-4037-a479-93b440211c73";

/// Report format "XML".
pub const XML_REPORT_FORMAT_ID: &str = "a994b278-1f62-11e1-96ac-406186ea4fc5";

/// Reference polling interval for [`ScanWorkflow::wait_for_completion`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the workflow engine.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Port list bound to every new target.
    pub port_list_id: String,

    /// Scan config bound to every new task.
    pub scan_config_id: String,

    /// Scanner bound to every new task.
    pub scanner_id: String,

    /// Format requested when fetching reports.
    pub report_format_id: String,

    /// Prefix of generated scan names.
    pub name_prefix: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            port_list_id: DEFAULT_PORT_LIST_ID.to_string(),
            scan_config_id: DEFAULT_SCAN_CONFIG_ID.to_string(),
            scanner_id: DEFAULT_SCANNER_ID.to_string(),
            report_format_id: XML_REPORT_FORMAT_ID.to_string(),
            name_prefix: "Scan-".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the port list.
    pub fn with_port_list(mut self, id: impl Into<String>) -> Self {
        self.port_list_id = id.into();
        self
    }

    /// Sets the scan config.
    pub fn with_scan_config(mut self, id: impl Into<String>) -> Self {
        self.scan_config_id = id.into();
        self
    }

    /// Sets the scanner.
    pub fn with_scanner(mut self, id: impl Into<String>) -> Self {
        self.scanner_id = id.into();
        self
    }

    /// Sets the scan name prefix.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}

/// Drives the target → task → start → poll → report sequence.
///
/// The engine keeps no per-scan state: every call talks to the manager
/// again, and every step is a single attempt (retries belong to the
/// transport). Nothing created on the manager is rolled back when a later
/// step fails.
///
/// # Example
///
/// ```rust,ignore
/// use scanrelay::core::Deadline;
/// use scanrelay::transport::{GvmCliTransport, TransportConfig};
/// use scanrelay::workflow::ScanWorkflow;
/// use std::time::Duration;
///
/// let workflow = ScanWorkflow::new(GvmCliTransport::new(TransportConfig::default()));
/// let deadline = Deadline::after(Duration::from_secs(120));
///
/// let job = workflow.start_scan("10.0.0.5", &deadline).await?;
/// let job = workflow.wait_for_completion(&job.task_id, Duration::from_secs(10), &Deadline::none()).await?;
/// if let Some(report_id) = job.report_id {
///     let report = workflow.get_report(&report_id, &deadline).await?;
///     println!("{} findings", report.summary.total_vulns);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ScanWorkflow {
    transport: ArcTransport,
    config: WorkflowConfig,
}

impl ScanWorkflow {
    /// Creates an engine over the given transport.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Creates an engine over a shared transport.
    pub fn from_arc(transport: ArcTransport) -> Self {
        Self {
            transport,
            config: WorkflowConfig::default(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &ArcTransport {
        &self.transport
    }

    /// Builds the scan name for `target` at `now`.
    pub fn scan_name(&self, target: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}{}-{}",
            self.config.name_prefix,
            target,
            now.format("%Y%m%d-%H%M%S")
        )
    }

    async fn send(&self, command: &str, deadline: &Deadline) -> Result<Vec<u8>, GmpError> {
        Ok(self.transport.execute(command, deadline).await?)
    }

    /// Creates a target and a task for `target`, then starts the task.
    ///
    /// # Errors
    ///
    /// - `Validation` if `target` is blank.
    /// - `TargetCreationFailed`, `TaskCreationFailed` or `TaskStartFailed`
    ///   naming the step that failed.
    pub async fn start_scan(&self, target: &str, deadline: &Deadline) -> WorkflowResult<ScanJob> {
        let target = target.trim();
        if target.is_empty() {
            return Err(WorkflowError::validation("target must not be empty"));
        }

        let mut job = ScanJob::new(self.scan_name(target, Utc::now()));
        tracing::info!(scan_target = %target, scan_name = %job.scan_name, "Starting scan workflow");

        let command = commands::create_target(&job.scan_name, target, &self.config.port_list_id);
        job.target_id = self
            .send(&command, deadline)
            .await
            .and_then(|raw| commands::extract_id(&raw))
            .map_err(|source| WorkflowError::TargetCreationFailed { source })?;
        job.phase = JobPhase::TargetCreated;
        tracing::debug!(target_id = %job.target_id, "Target created");

        let command = commands::create_task(
            &job.scan_name,
            &job.target_id,
            &self.config.scan_config_id,
            &self.config.scanner_id,
        );
        job.task_id = self
            .send(&command, deadline)
            .await
            .and_then(|raw| commands::extract_id(&raw))
            .map_err(|source| WorkflowError::TaskCreationFailed { source })?;
        job.phase = JobPhase::TaskCreated;
        tracing::debug!(task_id = %job.task_id, "Task created");

        self.send(&commands::start_task(&job.task_id), deadline)
            .await
            .and_then(|raw| commands::expect_ok(&raw))
            .map_err(|source| WorkflowError::TaskStartFailed { source })?;

        job.phase = JobPhase::Started;
        job.status = JobStatus::Running;
        job.progress = 0;

        tracing::info!(
            target_id = %job.target_id,
            task_id = %job.task_id,
            "Scan started"
        );
        crate::audit::emit_scan_started(target, &job);

        Ok(job)
    }

    /// Queries the current status of a task.
    ///
    /// # Errors
    ///
    /// - `Validation` if `task_id` is blank.
    /// - `StatusQueryFailed` otherwise.
    pub async fn get_status(&self, task_id: &str, deadline: &Deadline) -> WorkflowResult<ScanJob> {
        if task_id.trim().is_empty() {
            return Err(WorkflowError::validation("task id must not be empty"));
        }

        let snapshot = self
            .send(&commands::get_task(task_id), deadline)
            .await
            .and_then(|raw| commands::parse_task(&raw))
            .map_err(|source| WorkflowError::StatusQueryFailed { source })?;

        let status = JobStatus::from_remote(&snapshot.status);
        let job = ScanJob {
            target_id: snapshot.target_id,
            task_id: if snapshot.task_id.is_empty() {
                task_id.to_string()
            } else {
                snapshot.task_id
            },
            scan_name: snapshot.name,
            progress: clamp_progress(&snapshot.progress),
            report_id: snapshot.report_id,
            phase: JobPhase::after_status(&status),
            status,
        };

        tracing::debug!(
            task_id = %job.task_id,
            status = %job.status,
            progress = job.progress,
            "Task status"
        );
        crate::audit::emit_status_polled(&job);

        Ok(job)
    }

    /// Fetches and normalizes a report.
    ///
    /// # Errors
    ///
    /// - `ReportFetchFailed` if the command fails or the manager rejects it.
    /// - `ReportParseFailed` if the response cannot be normalized; the raw
    ///   response is available through [`WorkflowError::raw_response`].
    pub async fn get_report(&self, report_id: &str, deadline: &Deadline) -> WorkflowResult<Report> {
        if report_id.trim().is_empty() {
            return Err(WorkflowError::validation("report id must not be empty"));
        }

        let command = commands::get_report(report_id, &self.config.report_format_id);
        let raw = self
            .send(&command, deadline)
            .await
            .map_err(|source| WorkflowError::ReportFetchFailed { source })?;

        let envelope = report::parse_envelope(&raw).map_err(|source| {
            tracing::warn!(report_id = %report_id, error = %source, "Report normalization failed");
            WorkflowError::ReportParseFailed {
                source,
                raw: String::from_utf8_lossy(&raw).into_owned(),
            }
        })?;

        commands::ensure_accepted(envelope.status.as_deref(), envelope.status_text.as_deref())
            .map_err(|source| WorkflowError::ReportFetchFailed { source })?;

        let report = envelope.report;
        tracing::info!(
            report_id = %report_id,
            vulns = report.summary.total_vulns,
            ports = report.summary.total_ports,
            "Report normalized"
        );
        crate::audit::emit_report_normalized(&report);

        Ok(report)
    }

    /// Returns the GMP version spoken by the manager.
    pub async fn version(&self, deadline: &Deadline) -> WorkflowResult<String> {
        self.send(commands::get_version(), deadline)
            .await
            .and_then(|raw| commands::parse_version(&raw))
            .map_err(|source| WorkflowError::VersionQueryFailed { source })
    }

    /// Polls a task every `interval` until it reaches a terminal status.
    ///
    /// # Errors
    ///
    /// Any status query failure, or `StatusQueryFailed` with a timeout kind
    /// once `deadline` fires between polls.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        interval: Duration,
        deadline: &Deadline,
    ) -> WorkflowResult<ScanJob> {
        loop {
            let job = self.get_status(task_id, deadline).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }

            deadline.sleep(interval).await.map_err(|reason| {
                WorkflowError::StatusQueryFailed {
                    source: GmpError::Transport(reason.into()),
                }
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, TransportError};
    use crate::transport::MockTransport;
    use chrono::TimeZone;

    fn happy_transport() -> MockTransport {
        MockTransport::new()
            .with_response(
                "<create_target",
                "<create_target_response status=\"201\" status_text=\"OK, resource created\" id=\"tgt-1\"/>",
            )
            .with_response(
                "<create_task",
                "<create_task_response status=\"201\" status_text=\"OK, resource created\" id=\"task-1\"/>",
            )
            .with_response(
                "<start_task",
                "<start_task_response status=\"202\" status_text=\"OK, request submitted\"><report_id>rep-1</report_id></start_task_response>",
            )
    }

    #[test]
    fn test_scan_name_format() {
        let workflow = ScanWorkflow::new(MockTransport::new());
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(workflow.scan_name("10.0.0.5", now), "Scan-10.0.0.5-20240309-070501");
    }

    #[tokio::test]
    async fn test_start_scan_happy_path() {
        let transport = Arc::new(happy_transport());
        let workflow = ScanWorkflow::from_arc(transport.clone());

        let job = workflow.start_scan("10.0.0.5", &Deadline::none()).await.unwrap();
        assert_eq!(job.target_id, "tgt-1");
        assert_eq!(job.task_id, "task-1");
        assert_eq!(job.phase, JobPhase::Started);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 0);
        assert!(job.scan_name.starts_with("Scan-10.0.0.5-"));

        let commands = transport.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].contains("<port_list id=\"33d0cd82-57c6-11e1-8ed1-406186ea4fc5\"/>"));
        assert!(commands[1].contains("<target id=\"tgt-1\"/>"));
        assert!(commands[1].contains("<config id=\"daba56c8-73ec-11df-a475-002264764cea\"/>"));
        assert_eq!(commands[2], "<start_task task_id=\"task-1\"/>");
    }

    #[tokio::test]
    async fn test_start_scan_rejects_empty_target() {
        let workflow = ScanWorkflow::new(MockTransport::new());
        let err = workflow.start_scan("  ", &Deadline::none()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_task_creation_failure_is_tagged() {
        let transport = MockTransport::new()
            .with_response("<create_target", "<create_target_response status=\"201\" id=\"tgt-1\"/>")
            .with_response("<create_task", "<create_task_response status=\"201\"/>");
        let workflow = ScanWorkflow::new(transport);

        let err = workflow.start_scan("10.0.0.5", &Deadline::none()).await.unwrap_err();
        assert_eq!(err.step(), "create_task");
        assert_eq!(err.kind(), ErrorKind::ProtocolExtraction);
        assert!(err.to_string().starts_with("failed to create task"));
    }

    #[tokio::test]
    async fn test_target_transport_failure() {
        let transport = MockTransport::new().with_failure("<create_target", "Authentication failed");
        let workflow = ScanWorkflow::new(transport);

        let err = workflow.start_scan("10.0.0.5", &Deadline::none()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::TargetCreationFailed {
                source: GmpError::Transport(TransportError::CommandFailed { .. })
            }
        ));
    }

    #[tokio::test]
    async fn test_get_status_maps_done() {
        let transport = MockTransport::new().with_response(
            "<get_tasks",
            r#"<get_tasks_response status="200" status_text="OK"><task id="task-1"><name>n</name><status>Done</status><progress>100</progress><last_report><report id="rep-9"/></last_report></task></get_tasks_response>"#,
        );
        let workflow = ScanWorkflow::new(transport);

        let job = workflow.get_status("task-1", &Deadline::none()).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.phase, JobPhase::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.report_id.as_deref(), Some("rep-9"));
    }

    #[tokio::test]
    async fn test_get_report_parse_failure_keeps_raw() {
        let transport = MockTransport::new()
            .with_response("<get_reports", "<get_reports_response><report></get_reports_response>");
        let workflow = ScanWorkflow::new(transport);

        let err = workflow.get_report("rep-1", &Deadline::none()).await.unwrap_err();
        assert_eq!(err.step(), "parse_report");
        assert!(err.raw_response().unwrap().contains("<get_reports_response>"));
    }

    #[tokio::test]
    async fn test_get_report_not_found() {
        let transport = MockTransport::new().with_response(
            "<get_reports",
            r#"<get_reports_response status="404" status_text="Failed to find report 'x'"/>"#,
        );
        let workflow = ScanWorkflow::new(transport);

        let err = workflow.get_report("x", &Deadline::none()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_version() {
        let transport = MockTransport::new().with_response(
            "<get_version",
            "<get_version_response status=\"200\" status_text=\"OK\"><version>22.4</version></get_version_response>",
        );
        let workflow = ScanWorkflow::new(transport);
        assert_eq!(workflow.version(&Deadline::none()).await.unwrap(), "22.4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_completion_times_out() {
        let transport = MockTransport::new().with_response(
            "<get_tasks",
            r#"<get_tasks_response status="200"><task id="t"><status>Running</status><progress>10</progress></task></get_tasks_response>"#,
        );
        let workflow = ScanWorkflow::new(transport);

        let deadline = Deadline::after(Duration::from_secs(25));
        let err = workflow
            .wait_for_completion("t", DEFAULT_POLL_INTERVAL, &deadline)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}

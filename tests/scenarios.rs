//! End-to-end scenarios across the public API.

use scanrelay::api::{AnalysisResponse, FanInSource, StartScanResponse, TaskStatusResponse};
use scanrelay::core::CommandOutput;
use scanrelay::prelude::*;
use scanrelay::transport::{MockRunner, MockTransport, PrivilegeMode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn manager() -> MockTransport {
    MockTransport::new()
        .with_response(
            "<create_target",
            r#"<create_target_response status="201" status_text="OK, resource created" id="7f0c-target"/>"#,
        )
        .with_response(
            "<create_task",
            r#"<create_task_response status="201" status_text="OK, resource created" id="3b1d-task"/>"#,
        )
        .with_response(
            "<start_task",
            r#"<start_task_response status="202" status_text="OK, request submitted"><report_id>9e2a-report</report_id></start_task_response>"#,
        )
}

#[tokio::test]
async fn scan_is_started_and_reported_as_running() {
    let transport = Arc::new(manager());
    let workflow = ScanWorkflow::from_arc(transport.clone());

    let job = workflow
        .start_scan("192.168.1.20", &Deadline::none())
        .await
        .unwrap();

    let response = serde_json::to_value(StartScanResponse::from(&job)).unwrap();
    assert_eq!(response["targetID"], "7f0c-target");
    assert_eq!(response["taskID"], "3b1d-task");
    assert_eq!(response["status"], "running");
    assert!(response["scanName"]
        .as_str()
        .unwrap()
        .starts_with("Scan-192.168.1.20-"));

    let commands = transport.commands();
    assert!(commands[0].contains("<hosts>192.168.1.20</hosts>"));
}

#[tokio::test]
async fn waiting_task_reports_zero_progress() {
    let transport = MockTransport::new().with_response(
        "<get_tasks",
        r#"<get_tasks_response status="200" status_text="OK">
             <task id="3b1d-task"><name>Scan-x</name><status>Running</status><progress>-1</progress></task>
           </get_tasks_response>"#,
    );
    let workflow = ScanWorkflow::new(transport);

    let job = workflow.get_status("3b1d-task", &Deadline::none()).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 0);
    assert!(job.report_id.is_none());

    let response = serde_json::to_value(TaskStatusResponse::from(&job)).unwrap();
    assert_eq!(response, json!({"taskID": "3b1d-task", "status": "running", "progress": 0}));
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let transport = MockTransport::new().with_response(
        "<get_reports",
        r#"<get_reports_response status="404" status_text="Failed to find report '0000'"/>"#,
    );
    let workflow = ScanWorkflow::new(transport);

    let err = workflow.get_report("0000", &Deadline::none()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.step(), "get_report");
}

#[tokio::test(start_paused = true)]
async fn transport_rides_out_a_restarting_manager() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("gvmd.sock");
    std::fs::write(&socket, b"").unwrap();

    let runner = MockRunner::new()
        .with_repeated(
            CommandOutput::failure(1, "Error: [Errno 111] Connection refused"),
            14,
        )
        .with_default(CommandOutput::success(
            r#"<get_version_response status="200" status_text="OK"><version>22.4</version></get_version_response>"#,
        ));
    let config = TransportConfig::new()
        .with_socket_path(&socket)
        .with_privilege(PrivilegeMode::Never);
    let transport = Arc::new(GvmCliTransport::with_runner(config, runner));

    let started = tokio::time::Instant::now();
    let workflow = ScanWorkflow::from_arc(transport.clone());
    let version = workflow.version(&Deadline::none()).await.unwrap();

    assert_eq!(version, "22.4");
    assert_eq!(transport.runner().call_count(), 15);
    assert!(started.elapsed() >= Duration::from_secs(28));
}

#[tokio::test]
async fn five_sources_complete_a_batch_once() {
    let aggregator = BatchAggregator::builder().build().unwrap();

    for source in FanInSource::ALL {
        let outcome = aggregator
            .contribute("user-1", "batch-A", source.as_str(), source.payload(None))
            .unwrap();
        assert!(outcome.was_recorded());
    }
    // A repeat after completion is acknowledged but ignored.
    let outcome = aggregator
        .contribute("user-1", "batch-A", "api_c", json!({"late": true}))
        .unwrap();
    assert!(!outcome.was_recorded());

    let analysis = aggregator
        .wait_for_analysis("user-1", "batch-A", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(analysis.summary, "Processed 5 sources");

    let response = AnalysisResponse::from(aggregator.get_batch("user-1", "batch-A").unwrap());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "complete");
    assert_eq!(json["batch_id"], "batch-A");
    assert_eq!(json["result"]["summary"], "Processed 5 sources");

    let err = aggregator.get_batch("user-2", "batch-A").unwrap_err();
    assert_eq!(err.kind().http_status(), 403);
}

//! Scan workflow example.
//!
//! This example shows how to:
//! - Drive a scan through start, status and report
//! - Read the normalized report
//!
//! A `MockTransport` stands in for the manager so the example runs anywhere.
//! Swap it for `GvmCliTransport::new(TransportConfig::default())` to talk to
//! a real installation.
//!
//! Run with: cargo run --example scan_workflow

use scanrelay::prelude::*;
use scanrelay::transport::MockTransport;
use std::time::Duration;

const REPORT: &str = r#"<get_reports_response status="200" status_text="OK">
  <report id="rep-1">
    <report id="rep-1">
      <scan_run_status>Done</scan_run_status>
      <task id="task-1"><name>demo</name><target id="tgt-1"><name>demo</name></target></task>
      <ports><count>1</count><port>22/tcp<host>10.0.0.5</host><threat>High</threat></port></ports>
      <results>
        <result id="res-1">
          <name>Weak SSH password</name>
          <host>10.0.0.5</host>
          <port>22/tcp</port>
          <nvt oid="1.3.6.1.4.1.25623.1.0.108013"><name>SSH Brute Force Logins</name><cvss_base>9.0</cvss_base></nvt>
          <threat>High</threat>
          <severity>9.0</severity>
          <qod><value>95</value></qod>
        </result>
      </results>
    </report>
  </report>
</get_reports_response>"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Scanrelay Scan Workflow Example ===\n");

    let transport = MockTransport::new()
        .with_response("<create_target", r#"<create_target_response status="201" id="tgt-1"/>"#)
        .with_response("<create_task", r#"<create_task_response status="201" id="task-1"/>"#)
        .with_response("<start_task", r#"<start_task_response status="202"/>"#)
        .with_response(
            "<get_tasks",
            r#"<get_tasks_response status="200"><task id="task-1"><status>Done</status><progress>-1</progress><last_report><report id="rep-1"/></last_report></task></get_tasks_response>"#,
        )
        .with_response("<get_reports", REPORT);

    let workflow = ScanWorkflow::new(transport);
    let deadline = Deadline::after(Duration::from_secs(60));

    let job = workflow.start_scan("10.0.0.5", &deadline).await?;
    println!("Started {} (target {}, task {})", job.scan_name, job.target_id, job.task_id);

    let job = workflow
        .wait_for_completion(&job.task_id, Duration::from_secs(1), &deadline)
        .await?;
    println!("Status: {} ({}%)", job.status, job.progress);

    let Some(report_id) = job.report_id else {
        println!("No report available");
        return Ok(());
    };

    let report = workflow.get_report(&report_id, &deadline).await?;

    println!("\n=== Report {} ===", report.report_id);
    println!("Run status: {}", report.scan_run_status);
    println!(
        "Findings: {} (high {}, medium {}, low {})",
        report.summary.total_vulns, report.summary.high, report.summary.medium, report.summary.low
    );
    for vuln in &report.vulnerabilities {
        println!(
            "  - [{:.1}] {} on {} {}",
            vuln.severity_score, vuln.name, vuln.host, vuln.port
        );
    }

    Ok(())
}

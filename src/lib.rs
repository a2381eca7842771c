//! # Scanrelay
//!
//! Orchestrates vulnerability scans on a Greenbone/OpenVAS manager and
//! aggregates fan-in batch results from independent sources.
//!
//! ## Overview
//!
//! Scanrelay sits between an HTTP routing layer and the scan manager,
//! letting you:
//!
//! - Create a target and a task, start it, and follow its progress
//! - Fetch a finished report and normalize it into a flat structure
//! - Reach the manager through `gvm-cli`, with privilege dropping, a
//!   containerized fallback and retries on transient connectivity errors
//! - Collect per-source contributions into batches analysed exactly once
//! - Run concurrent TCP and UDP port scans with nmap
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scanrelay::{GvmCliTransport, ScanWorkflow, TransportConfig};
//! use scanrelay::core::Deadline;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = GvmCliTransport::new(TransportConfig::default());
//!     let workflow = ScanWorkflow::new(transport);
//!
//!     let deadline = Deadline::after(Duration::from_secs(3600));
//!     let job = workflow.start_scan("10.0.0.5", &deadline).await?;
//!     let job = workflow
//!         .wait_for_completion(&job.task_id, Duration::from_secs(10), &deadline)
//!         .await?;
//!
//!     if let Some(report_id) = job.report_id {
//!         let report = workflow.get_report(&report_id, &deadline).await?;
//!         println!("{} findings", report.summary.total_vulns);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the nmap driver
//! - `nmap` - Dual-mode (TCP/UDP) port scanning
//!
//! ## Architecture
//!
//! - **Core**: Scan job types, transport seams, deadlines and errors
//! - **Transport**: `gvm-cli` invocation and transient retries
//! - **Workflow**: The scan lifecycle and GMP command handling
//! - **Report**: Report normalization
//! - **Batch**: Fan-in aggregation and one-time analysis
//! - **Portscan**: Concurrent nmap scans
//! - **Api**: JSON bodies for the routing layer
//! - **Audit**: Structured audit events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod audit;
pub mod batch;
pub mod core;
#[cfg(feature = "nmap")]
pub mod portscan;
pub mod report;
pub mod transport;
pub mod workflow;

// Re-export commonly used types at the crate root
pub use crate::core::{
    BatchError, Deadline, ErrorKind, JobPhase, JobStatus, ScanJob, Transport, TransportError,
    WorkflowError,
};

pub use crate::batch::{BatchAggregator, BatchConfig, ContributionOutcome};
pub use crate::report::Report;
pub use crate::transport::{GvmCliTransport, RetryConfig, TransportConfig};
pub use crate::workflow::{ScanWorkflow, WorkflowConfig};

#[cfg(feature = "nmap")]
pub use crate::portscan::{NmapConfig, PortScanner};

/// Prelude module for convenient imports.
///
/// ```rust
/// use scanrelay::prelude::*;
/// ```
pub mod prelude {
    pub use crate::batch::{
        Analyzer, BatchAggregator, BatchConfig, BatchStore, ContributionOutcome,
        InMemoryBatchStore, SummaryAnalyzer,
    };
    pub use crate::core::{
        BatchError, Deadline, ErrorKind, JobPhase, JobStatus, ScanJob, Transport, TransportError,
        WorkflowError,
    };
    #[cfg(feature = "nmap")]
    pub use crate::portscan::{CombinedScan, NmapConfig, PortScanner};
    pub use crate::report::Report;
    pub use crate::transport::{GvmCliTransport, RetryConfig, TransportConfig};
    pub use crate::workflow::{ScanWorkflow, WorkflowConfig};
}

//! Scan workflow engine.
//!
//! [`ScanWorkflow`] creates a target and a task on the manager, starts the
//! task, reports its status and fetches the normalized report. The
//! [`commands`] module holds the GMP command builders and the decoding of
//! the small responses along the way.

pub mod commands;
pub mod engine;

pub use engine::{
    ScanWorkflow, WorkflowConfig, DEFAULT_POLL_INTERVAL, DEFAULT_PORT_LIST_ID,
    DEFAULT_SCANNER_ID, DEFAULT_SCAN_CONFIG_ID, XML_REPORT_FORMAT_ID,
};

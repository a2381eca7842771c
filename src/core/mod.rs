//! Core types and traits for the scanrelay library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - The scan job, its status and workflow phase
//! - [`traits`] - The `Transport` and `CommandRunner` seams
//! - [`error`] - Structured error types
//! - [`deadline`] - Cancellation and expiry for blocking calls

pub mod deadline;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use deadline::{Deadline, Interrupted};
pub use error::{
    BatchError, BatchResult, ErrorKind, GmpError, ParseError, PortScanError, PortScanResult,
    TransportError, TransportResult, WorkflowError, WorkflowResult,
};
pub use traits::{ArcTransport, CommandOutput, CommandRunner, Transport};
pub use types::{clamp_progress, JobPhase, JobStatus, ScanJob};

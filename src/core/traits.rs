//! Core traits for the scanrelay library.
//!
//! [`Transport`] is the seam between the workflow engine and the scan
//! manager: it takes one protocol command and returns the raw response.
//! [`CommandRunner`] sits one level lower and launches external programs,
//! which lets the gvm-cli transport and the nmap driver be tested without
//! either program installed.

use crate::core::deadline::Deadline;
use crate::core::error::TransportResult;

use async_trait::async_trait;
use std::fmt::Debug;

/// Executes one GMP command against the scan manager.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one transport is shared by
///   every concurrent workflow call.
/// - The returned bytes are the raw output of the control program. Callers
///   strip any preamble before decoding.
/// - Implementations should stop promptly when `deadline` fires.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scanrelay::core::{Deadline, Transport, TransportResult};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Canned;
///
/// #[async_trait]
/// impl Transport for Canned {
///     async fn execute(&self, _command: &str, _deadline: &Deadline) -> TransportResult<Vec<u8>> {
///         Ok(b"<get_version_response status=\"200\"><version>22.4</version></get_version_response>".to_vec())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `command` and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// - `CommandFailed` - the control program failed with a non-transient error.
    /// - `RetriesExhausted` - every attempt hit a transient connectivity error.
    /// - `Configuration` - no endpoint could be resolved.
    /// - `Cancelled` / `DeadlineExceeded` - the caller gave up.
    async fn execute(&self, command: &str, deadline: &Deadline) -> TransportResult<Vec<u8>>;

    /// Returns a short name used in logs.
    fn name(&self) -> &str {
        "transport"
    }
}

/// Output of a finished external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful output carrying `stdout`.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed output with the given exit code and combined text.
    pub fn failure(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// Launches external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    /// Runs `program` with `args` to completion and captures its output.
    ///
    /// A non-zero exit is not an error at this level; only a failure to
    /// launch the program is.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        deadline: &Deadline,
    ) -> TransportResult<CommandOutput>;
}

/// An arc-wrapped transport for shared ownership.
pub type ArcTransport = std::sync::Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_joins_streams() {
        let output = CommandOutput {
            success: false,
            exit_code: Some(1),
            stdout: b"partial ".to_vec(),
            stderr: b"Connection refused".to_vec(),
        };
        assert_eq!(output.combined(), "partial Connection refused");
    }

    #[test]
    fn test_constructors() {
        assert!(CommandOutput::success("<ok/>").success);
        let failed = CommandOutput::failure(2, "boom");
        assert!(!failed.success);
        assert_eq!(failed.exit_code, Some(2));
    }
}

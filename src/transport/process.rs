//! Process execution on top of `tokio::process`.

use crate::core::{CommandOutput, CommandRunner, Deadline, TransportError, TransportResult};

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Runs external programs with `tokio::process`.
///
/// The child is killed if the deadline fires before it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        deadline: &Deadline,
    ) -> TransportResult<CommandOutput> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the wait future on interruption drops the child, which kills it.
        let output = deadline
            .run(child.wait_with_output())
            .await?
            .map_err(|source| TransportError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Returns `true` if the process runs with effective uid 0.
#[cfg(unix)]
pub fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Returns `true` if the process runs with effective uid 0.
#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let runner = ProcessRunner::new();
        let err = runner
            .run("definitely-not-a-real-program-4242", &[], &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}

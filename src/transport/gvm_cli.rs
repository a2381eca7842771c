//! GMP transport that shells out to `gvm-cli`.
//!
//! # Endpoint resolution
//!
//! Every call resolves its endpoint afresh:
//!
//! 1. If the configured unix socket exists, `gvm-cli` talks to it directly.
//!    When the process is root and the privilege-drop wrapper is available,
//!    the call becomes `runuser -u <run_as> -- gvm-cli ...`.
//! 2. Otherwise the call runs inside the compose service:
//!    `docker compose -f <file> run --rm gvm-tools gvm-cli ...`.
//!
//! # Retries
//!
//! Failures whose output contains a transient marker (socket not yet
//! listening, temporarily unavailable) are retried with the configured
//! delay. Any other failure is returned immediately.

use crate::core::{
    CommandOutput, CommandRunner, Deadline, Transport, TransportError, TransportResult,
};
use crate::transport::config::{PrivilegeMode, TransportConfig, COMPOSE_FILE_NAME};
use crate::transport::process::{running_as_root, ProcessRunner};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};

/// How a command reaches the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// `gvm-cli` against the local socket.
    Direct,
    /// `gvm-cli` wrapped in the privilege-drop wrapper.
    PrivilegeDropped,
    /// `gvm-cli` inside the compose service.
    Container,
}

impl InvocationMode {
    /// Returns a short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::PrivilegeDropped => "privilege-dropped",
            Self::Container => "container",
        }
    }
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Endpoint mode.
    pub mode: InvocationMode,
    /// Program to launch.
    pub program: String,
    /// Its arguments.
    pub args: Vec<String>,
}

/// Transport that executes GMP commands through `gvm-cli`.
///
/// # Example
///
/// ```rust,ignore
/// use scanrelay::transport::{GvmCliTransport, TransportConfig};
///
/// let transport = GvmCliTransport::new(
///     TransportConfig::new().with_credentials("admin", "admin"),
/// );
/// ```
#[derive(Debug)]
pub struct GvmCliTransport<R = ProcessRunner> {
    config: TransportConfig,
    runner: R,
}

impl GvmCliTransport<ProcessRunner> {
    /// Creates a transport that launches real processes.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_runner(config, ProcessRunner::new())
    }
}

impl<R: CommandRunner> GvmCliTransport<R> {
    /// Creates a transport with a custom process runner.
    pub fn with_runner(config: TransportConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the process runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Resolves the process invocation for `command`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the socket is absent and no compose file
    /// can be found.
    pub fn resolve(&self, command: &str) -> TransportResult<Invocation> {
        if self.config.socket_path.exists() {
            Ok(self.socket_invocation(command))
        } else {
            self.container_invocation(command)
        }
    }

    fn credential_args(&self) -> Vec<String> {
        vec![
            "--gmp-username".to_string(),
            self.config.username.clone(),
            "--gmp-password".to_string(),
            self.config.password.expose_secret().to_string(),
        ]
    }

    fn socket_invocation(&self, command: &str) -> Invocation {
        let mut cli_args = self.credential_args();
        cli_args.extend([
            "socket".to_string(),
            "--socketpath".to_string(),
            self.config.socket_path.to_string_lossy().into_owned(),
            "--xml".to_string(),
            command.to_string(),
        ]);

        if self.should_drop_privilege() {
            let mut args = vec![
                "-u".to_string(),
                self.config.run_as.clone(),
                "--".to_string(),
                self.config.control_program.clone(),
            ];
            args.extend(cli_args);
            Invocation {
                mode: InvocationMode::PrivilegeDropped,
                program: self.config.privilege_wrapper.clone(),
                args,
            }
        } else {
            Invocation {
                mode: InvocationMode::Direct,
                program: self.config.control_program.clone(),
                args: cli_args,
            }
        }
    }

    fn should_drop_privilege(&self) -> bool {
        match self.config.privilege {
            PrivilegeMode::Always => true,
            PrivilegeMode::Never => false,
            PrivilegeMode::Auto => running_as_root() && self.wrapper_available(),
        }
    }

    /// Returns `true` if the privilege-drop wrapper resolves to an executable.
    fn wrapper_available(&self) -> bool {
        which::which(&self.config.privilege_wrapper).is_ok()
    }

    fn container_invocation(&self, command: &str) -> TransportResult<Invocation> {
        let compose = self.locate_compose_file()?;

        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            compose.to_string_lossy().into_owned(),
            "run".to_string(),
            "--rm".to_string(),
            self.config.container_service.clone(),
            self.config.control_program.clone(),
        ];
        args.extend(self.credential_args());
        args.extend([
            "socket".to_string(),
            "--xml".to_string(),
            command.to_string(),
        ]);

        Ok(Invocation {
            mode: InvocationMode::Container,
            program: self.config.container_program.clone(),
            args,
        })
    }

    fn locate_compose_file(&self) -> TransportResult<PathBuf> {
        if let Some(ref explicit) = self.config.compose_path {
            if explicit.is_file() {
                return Ok(explicit.clone());
            }
            return Err(TransportError::configuration(format!(
                "socket {} not found and compose file {} does not exist",
                self.config.socket_path.display(),
                explicit.display()
            )));
        }

        let start = match self.config.search_root {
            Some(ref root) => root.clone(),
            None => std::env::current_dir().map_err(|e| {
                TransportError::configuration(format!("cannot determine working directory: {e}"))
            })?,
        };

        find_compose_upwards(&start).ok_or_else(|| {
            TransportError::configuration(format!(
                "socket {} not found and no {} above {}",
                self.config.socket_path.display(),
                COMPOSE_FILE_NAME,
                start.display()
            ))
        })
    }

    async fn run_with_retry(
        &self,
        invocation: &Invocation,
        deadline: &Deadline,
    ) -> TransportResult<Vec<u8>> {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let delay = retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                deadline.sleep(delay).await?;
            }

            let output: CommandOutput = self
                .runner
                .run(&invocation.program, &invocation.args, deadline)
                .await?;
            attempt += 1;

            if output.success {
                if attempt > 1 {
                    tracing::info!(
                        program = %invocation.program,
                        attempts = attempt,
                        "GMP command succeeded after retry"
                    );
                }
                return Ok(output.stdout);
            }

            let combined = output.combined();
            if !retry.is_transient(&combined) {
                tracing::warn!(
                    program = %invocation.program,
                    exit_code = ?output.exit_code,
                    "GMP command failed"
                );
                return Err(TransportError::CommandFailed {
                    program: invocation.program.clone(),
                    exit_code: output.exit_code,
                    output: combined,
                });
            }

            if !retry.should_retry(attempt) {
                tracing::warn!(
                    program = %invocation.program,
                    attempts = attempt,
                    "GMP endpoint still unavailable, giving up"
                );
                return Err(TransportError::RetriesExhausted {
                    program: invocation.program.clone(),
                    attempts: attempt,
                    output: combined,
                });
            }

            tracing::debug!(
                attempt = attempt,
                max_attempts = retry.max_attempts,
                "GMP endpoint not ready, retrying"
            );
        }
    }
}

#[async_trait]
impl<R: CommandRunner> Transport for GvmCliTransport<R> {
    async fn execute(&self, command: &str, deadline: &Deadline) -> TransportResult<Vec<u8>> {
        let invocation = self.resolve(command)?;
        tracing::debug!(
            mode = invocation.mode.as_str(),
            program = %invocation.program,
            "Executing GMP command"
        );
        self.run_with_retry(&invocation, deadline).await
    }

    fn name(&self) -> &str {
        "gvm-cli"
    }
}

/// Walks from `start` towards the filesystem root looking for the compose file.
fn find_compose_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(COMPOSE_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::transport::mock::MockRunner;
    use crate::transport::RetryConfig;
    use std::time::Duration;

    fn socket_config(dir: &tempfile::TempDir) -> TransportConfig {
        let socket = dir.path().join("gvmd.sock");
        std::fs::write(&socket, b"").unwrap();
        TransportConfig::new()
            .with_socket_path(socket)
            .with_credentials("admin", "pw")
            .with_privilege(PrivilegeMode::Never)
    }

    #[test]
    fn test_direct_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let transport = GvmCliTransport::with_runner(socket_config(&dir), MockRunner::new());

        let inv = transport.resolve("<get_version/>").unwrap();
        assert_eq!(inv.mode, InvocationMode::Direct);
        assert_eq!(inv.program, "gvm-cli");
        assert_eq!(&inv.args[..4], ["--gmp-username", "admin", "--gmp-password", "pw"]);
        assert_eq!(inv.args[4], "socket");
        assert_eq!(inv.args[5], "--socketpath");
        assert_eq!(inv.args.last().map(String::as_str), Some("<get_version/>"));
    }

    #[test]
    fn test_privilege_dropped_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let config = socket_config(&dir)
            .with_privilege(PrivilegeMode::Always)
            .with_run_as("gvm");
        let transport = GvmCliTransport::with_runner(config, MockRunner::new());

        let inv = transport.resolve("<get_version/>").unwrap();
        assert_eq!(inv.mode, InvocationMode::PrivilegeDropped);
        assert_eq!(inv.program, "runuser");
        assert_eq!(&inv.args[..4], ["-u", "gvm", "--", "gvm-cli"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_wrapper_must_be_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("runuser");
        std::fs::write(&wrapper, b"#!/bin/sh\nexec \"$@\"\n").unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = socket_config(&dir)
            .with_privilege(PrivilegeMode::Auto)
            .with_privilege_wrapper(wrapper.to_string_lossy());
        let transport = GvmCliTransport::with_runner(config, MockRunner::new());
        assert!(!transport.wrapper_available());
        assert_eq!(
            transport.resolve("<get_version/>").unwrap().mode,
            InvocationMode::Direct
        );

        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(transport.wrapper_available());
    }

    #[test]
    fn test_missing_wrapper_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = socket_config(&dir).with_privilege_wrapper("definitely-not-a-real-wrapper-4242");
        let transport = GvmCliTransport::with_runner(config, MockRunner::new());
        assert!(!transport.wrapper_available());
    }

    #[test]
    fn test_container_fallback_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(COMPOSE_FILE_NAME), b"services: {}").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = TransportConfig::new()
            .with_socket_path(dir.path().join("missing.sock"))
            .with_search_root(&nested);
        let transport = GvmCliTransport::with_runner(config, MockRunner::new());

        let inv = transport.resolve("<get_version/>").unwrap();
        assert_eq!(inv.mode, InvocationMode::Container);
        assert_eq!(inv.program, "docker");
        assert_eq!(inv.args[0], "compose");
        assert_eq!(
            PathBuf::from(&inv.args[2]),
            dir.path().join(COMPOSE_FILE_NAME)
        );
        assert_eq!(&inv.args[3..7], ["run", "--rm", "gvm-tools", "gvm-cli"]);
        assert!(!inv.args.iter().any(|a| a == "--socketpath"));
    }

    #[test]
    fn test_missing_compose_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransportConfig::new()
            .with_socket_path(dir.path().join("missing.sock"))
            .with_compose_path(dir.path().join("nope.yml"));
        let transport = GvmCliTransport::with_runner(config, MockRunner::new());

        let err = transport.resolve("<get_version/>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_non_transient_failure_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new().with_output(CommandOutput::failure(1, "Authentication failed"));
        let transport = GvmCliTransport::with_runner(socket_config(&dir), runner);

        let err = transport
            .execute("<get_version/>", &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::CommandFailed { .. }));
        assert_eq!(transport.runner().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_carries_last_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = socket_config(&dir)
            .with_retry(RetryConfig::new().with_max_attempts(3).with_delay(Duration::from_secs(2)));
        let runner = MockRunner::new()
            .with_default(CommandOutput::failure(1, "Connection refused"));
        let transport = GvmCliTransport::with_runner(config, runner);

        let err = transport
            .execute("<get_version/>", &Deadline::none())
            .await
            .unwrap_err();
        match err {
            TransportError::RetriesExhausted { attempts, output, .. } => {
                assert_eq!(attempts, 3);
                assert!(output.contains("Connection refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.runner().call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_retry_sleep() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new()
            .with_default(CommandOutput::failure(1, "Connection refused"));
        let transport = GvmCliTransport::with_runner(socket_config(&dir), runner);

        let deadline = Deadline::after(Duration::from_secs(5));
        let err = transport
            .execute("<get_version/>", &deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::DeadlineExceeded));
        // Attempts at t=0, 2s and 4s; the sleep towards 6s is interrupted.
        assert_eq!(transport.runner().call_count(), 3);
    }
}

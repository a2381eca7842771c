//! Mock transport and process runner for testing.
//!
//! These let the workflow engine, the gvm-cli transport and the nmap driver
//! be exercised without a scan manager or any external program installed.

use crate::core::{
    CommandOutput, CommandRunner, Deadline, Transport, TransportError, TransportResult,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A process runner that replays scripted outputs.
///
/// Scripted outputs are consumed in order; once they run out, the default
/// output is returned for every further call.
///
/// # Examples
///
/// ```rust
/// use scanrelay::core::CommandOutput;
/// use scanrelay::transport::MockRunner;
///
/// let runner = MockRunner::new()
///     .with_output(CommandOutput::failure(1, "Connection refused"))
///     .with_default(CommandOutput::success("<ok/>"));
/// assert_eq!(runner.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockRunner {
    scripted: Mutex<VecDeque<CommandOutput>>,
    default_output: CommandOutput,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    call_count: AtomicU64,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Creates a runner whose default output is an empty success.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default_output: CommandOutput::success(Vec::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicU64::new(0),
        }
    }

    /// Appends a scripted output.
    pub fn with_output(self, output: CommandOutput) -> Self {
        self.push_output(output);
        self
    }

    /// Appends `count` copies of a scripted output.
    pub fn with_repeated(self, output: CommandOutput, count: usize) -> Self {
        for _ in 0..count {
            self.push_output(output.clone());
        }
        self
    }

    /// Sets the output returned once the script is exhausted.
    pub fn with_default(mut self, output: CommandOutput) -> Self {
        self.default_output = output;
        self
    }

    /// Appends a scripted output (shared-reference version).
    pub fn push_output(&self, output: CommandOutput) {
        self.scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(output);
    }

    /// Returns the number of runs performed.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Returns every `(program, args)` pair seen so far.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        deadline: &Deadline,
    ) -> TransportResult<CommandOutput> {
        if deadline.is_expired() {
            return Err(if deadline.token().is_cancelled() {
                TransportError::Cancelled
            } else {
                TransportError::DeadlineExceeded
            });
        }

        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((program.to_string(), args.to_vec()));

        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| self.default_output.clone()))
    }
}

/// A transport that answers GMP commands from canned responses.
///
/// Responses are keyed by command prefix (for example `"<create_target"`);
/// the longest matching prefix wins. Commands without a match fail with
/// `CommandFailed`.
///
/// # Examples
///
/// ```rust
/// use scanrelay::transport::MockTransport;
///
/// let transport = MockTransport::new()
///     .with_response("<get_version", "<get_version_response status=\"200\"><version>22.4</version></get_version_response>");
/// assert!(transport.commands().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<Vec<(String, Result<Vec<u8>, String>)>>,
    commands: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a transport with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a successful response for commands starting with `prefix`.
    pub fn with_response(self, prefix: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.set_response(prefix, body);
        self
    }

    /// Adds a failing response for commands starting with `prefix`.
    pub fn with_failure(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
        self.lock_responses()
            .push((prefix.into(), Err(output.into())));
        self
    }

    /// Adds or replaces a successful response.
    pub fn set_response(&self, prefix: impl Into<String>, body: impl Into<Vec<u8>>) {
        let prefix = prefix.into();
        let mut responses = self.lock_responses();
        responses.retain(|(p, _)| *p != prefix);
        responses.push((prefix, Ok(body.into())));
    }

    /// Returns every command executed so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, Vec<(String, Result<Vec<u8>, String>)>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, command: &str, deadline: &Deadline) -> TransportResult<Vec<u8>> {
        if deadline.is_expired() {
            return Err(TransportError::DeadlineExceeded);
        }

        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.to_string());

        let responses = self.lock_responses();
        let matched = responses
            .iter()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match matched {
            Some((_, Ok(body))) => Ok(body.clone()),
            Some((_, Err(output))) => Err(TransportError::CommandFailed {
                program: "mock".to_string(),
                exit_code: Some(1),
                output: output.clone(),
            }),
            None => Err(TransportError::CommandFailed {
                program: "mock".to_string(),
                exit_code: Some(1),
                output: format!("no canned response for {command}"),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

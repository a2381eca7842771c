//! Transport layer for GMP commands.
//!
//! This module provides:
//!
//! - [`GvmCliTransport`] - executes commands through `gvm-cli`, with
//!   privilege dropping, a containerized fallback and transient retries
//! - [`ProcessRunner`] - launches programs with `tokio::process`
//! - [`MockTransport`] / [`MockRunner`] - scripted stand-ins for tests

pub mod config;
pub mod gvm_cli;
pub mod mock;
pub mod process;
pub mod retry;

pub use config::{PrivilegeMode, TransportConfig, DEFAULT_SOCKET_PATH};
pub use gvm_cli::{GvmCliTransport, Invocation, InvocationMode};
pub use mock::{MockRunner, MockTransport};
pub use process::ProcessRunner;
pub use retry::RetryConfig;

/// Returns everything from the first `<` onwards.
///
/// Control programs may print banners or warnings before the XML envelope.
/// Returns `None` when the output contains no `<` at all.
pub fn strip_preamble(raw: &[u8]) -> Option<&[u8]> {
    raw.iter().position(|&b| b == b'<').map(|start| &raw[start..])
}

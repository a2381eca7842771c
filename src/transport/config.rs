//! Transport configuration.

use crate::transport::retry::RetryConfig;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Default GMP unix socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/gvmd/gvmd.sock";

/// Compose file name searched for by the containerized fallback.
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// When to wrap the control program in the privilege-drop wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMode {
    /// Drop privilege when running as root and the wrapper is on `PATH`.
    #[default]
    Auto,
    /// Always use the wrapper.
    Always,
    /// Never use the wrapper.
    Never,
}

/// Configuration for [`GvmCliTransport`](super::GvmCliTransport).
///
/// Values are read once by the embedding application and passed in; the
/// transport never consults the process environment for them.
///
/// # Examples
///
/// ```rust
/// use scanrelay::transport::TransportConfig;
///
/// let config = TransportConfig::new()
///     .with_socket_path("/run/gvmd/gvmd.sock")
///     .with_credentials("scanner", "s3cret")
///     .with_run_as("gvm");
/// assert_eq!(config.run_as, "gvm");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// GMP unix socket.
    pub socket_path: PathBuf,

    /// GMP username.
    pub username: String,

    /// GMP password (kept secret).
    #[serde(deserialize_with = "secret_from_string")]
    pub password: SecretString,

    /// Account the control program runs as after dropping privilege.
    pub run_as: String,

    /// Explicit compose file for the containerized fallback.
    pub compose_path: Option<PathBuf>,

    /// Directory the compose file search starts from. Defaults to the
    /// current working directory.
    pub search_root: Option<PathBuf>,

    /// The GMP control program.
    pub control_program: String,

    /// The privilege-drop wrapper.
    pub privilege_wrapper: String,

    /// Program used for the containerized fallback.
    pub container_program: String,

    /// Compose service that provides the control program.
    pub container_service: String,

    /// Privilege-drop policy.
    pub privilege: PrivilegeMode,

    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            username: "admin".to_string(),
            password: SecretString::new("admin".into()),
            run_as: "_gvm".to_string(),
            compose_path: None,
            search_root: None,
            control_program: "gvm-cli".to_string(),
            privilege_wrapper: "runuser".to_string(),
            container_program: "docker".to_string(),
            container_service: "gvm-tools".to_string(),
            privilege: PrivilegeMode::Auto,
            retry: RetryConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the GMP socket path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Sets the GMP credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        let password: String = password.into();
        self.password = SecretString::new(password.into_boxed_str());
        self
    }

    /// Sets the account used after dropping privilege.
    pub fn with_run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = user.into();
        self
    }

    /// Sets an explicit compose file for the fallback.
    pub fn with_compose_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.compose_path = Some(path.into());
        self
    }

    /// Sets the directory the compose file search starts from.
    pub fn with_search_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_root = Some(dir.into());
        self
    }

    /// Sets the control program.
    pub fn with_control_program(mut self, program: impl Into<String>) -> Self {
        self.control_program = program.into();
        self
    }

    /// Sets the privilege-drop wrapper.
    pub fn with_privilege_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.privilege_wrapper = wrapper.into();
        self
    }

    /// Sets the privilege-drop policy.
    pub fn with_privilege(mut self, mode: PrivilegeMode) -> Self {
        self.privilege = mode;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn secret_from_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.username, "admin");
        assert_eq!(config.password.expose_secret(), "admin");
        assert_eq!(config.run_as, "_gvm");
        assert_eq!(config.privilege, PrivilegeMode::Auto);
        assert_eq!(config.retry.max_attempts, 15);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TransportConfig = serde_json::from_str(
            r#"{
                "username": "ops",
                "password": "hunter2",
                "privilege": "never",
                "retry": {"max_attempts": 2, "delay": 10}
            }"#,
        )
        .unwrap();
        assert_eq!(config.username, "ops");
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert_eq!(config.privilege, PrivilegeMode::Never);
        assert_eq!(config.retry.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(config.control_program, "gvm-cli");
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = TransportConfig::new().with_credentials("u", "topsecret");
        assert!(!format!("{:?}", config).contains("topsecret"));
    }
}

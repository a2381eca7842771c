//! Retry configuration for the control-program transport.

use serde::Deserialize;
use std::time::Duration;

/// Output fragments that mark a transient connectivity failure.
pub const DEFAULT_TRANSIENT_MARKERS: [&str; 3] = [
    "Connection refused",
    "Resource temporarily unavailable",
    "No such file",
];

/// How often, and how far apart, a transient failure is retried.
///
/// The manager socket is often not ready right after the daemon starts, so
/// the defaults keep trying for about half a minute: 15 attempts, 2 s apart.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,

    /// Pause between two attempts, in milliseconds when deserialized.
    #[serde(with = "duration_millis")]
    pub delay: Duration,

    /// A failure is retried only if its output contains one of these.
    pub transient_markers: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            delay: Duration::from_secs(2),
            transient_markers: DEFAULT_TRANSIENT_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl RetryConfig {
    /// Creates the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the number of attempts; at least one is always made.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the transient markers.
    pub fn with_transient_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transient_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Pause before attempt number `attempt` (0-indexed); none before the first.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }

    /// Returns whether another attempt may follow `attempt` completed ones.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Returns `true` if `output` contains one of the transient markers.
    pub fn is_transient(&self, output: &str) -> bool {
        self.transient_markers
            .iter()
            .any(|marker| !marker.is_empty() && output.contains(marker.as_str()))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_span_about_thirty_seconds() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 15);

        let total: Duration = (0..config.max_attempts).map(|a| config.delay_for_attempt(a)).sum();
        assert_eq!(total, Duration::from_secs(28));
    }

    #[test]
    fn test_first_attempt_is_immediate() {
        let config = RetryConfig::new().with_delay(Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(9), Duration::from_millis(500));
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert!(config.should_retry(0));
        assert!(!config.should_retry(1));
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn test_transient_markers() {
        let config = RetryConfig::default();
        assert!(config.is_transient("Error: [Errno 111] Connection refused"));
        assert!(config.is_transient("socket: No such file or directory"));
        assert!(!config.is_transient("Authentication failed"));

        let custom = RetryConfig::new().with_transient_markers(["", "busy"]);
        assert!(custom.is_transient("manager busy"));
        assert!(!custom.is_transient("Connection refused"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 3, "delay": 250}"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay, Duration::from_millis(250));
        assert_eq!(config.transient_markers.len(), 3);
    }
}

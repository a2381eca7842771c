//! Caller-supplied deadlines.
//!
//! A [`Deadline`] combines a cancellation token with an optional expiry
//! instant. Every blocking operation in the crate (process execution, retry
//! sleeps, polling) races against it so a cancelled request stops promptly.

use crate::core::error::TransportError;

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The token was cancelled.
    Cancelled,
    /// The expiry instant passed.
    TimedOut,
}

impl From<Interrupted> for TransportError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Cancelled => TransportError::Cancelled,
            Interrupted::TimedOut => TransportError::DeadlineExceeded,
        }
    }
}

/// A cancellable deadline.
///
/// # Examples
///
/// ```rust
/// use scanrelay::core::Deadline;
/// use std::time::Duration;
///
/// let deadline = Deadline::after(Duration::from_secs(30));
/// assert!(!deadline.is_expired());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires on its own.
    pub fn none() -> Self {
        Self::default()
    }

    /// A deadline that expires after `timeout`.
    pub fn after(timeout: Duration) -> Self {
        Self::none().with_timeout(timeout)
    }

    /// A deadline driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    /// Adds (or tightens) an expiry.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        self.expires_at = Some(match self.expires_at {
            Some(existing) => existing.min(at),
            None => at,
        });
        self
    }

    /// Returns the cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the deadline.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Time left before expiry, if an expiry is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if the deadline was cancelled or has passed.
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves when the deadline fires.
    pub async fn expired(&self) -> Interrupted {
        match self.expires_at {
            Some(at) => tokio::select! {
                _ = self.token.cancelled() => Interrupted::Cancelled,
                _ = tokio::time::sleep_until(at) => Interrupted::TimedOut,
            },
            None => {
                self.token.cancelled().await;
                Interrupted::Cancelled
            }
        }
    }

    /// Runs `fut` to completion unless the deadline fires first.
    ///
    /// The future is dropped when the deadline wins.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            reason = self.expired() => Err(reason),
            output = fut => Ok(output),
        }
    }

    /// Sleeps for `duration` unless the deadline fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_timeout() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let result = deadline.sleep(Duration::from_secs(10)).await;
        assert_eq!(result, Err(Interrupted::TimedOut));
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_run() {
        let deadline = Deadline::none();
        deadline.cancel();
        let result = deadline.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert_eq!(deadline.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_keeps_earliest_expiry() {
        let deadline = Deadline::after(Duration::from_secs(5)).with_timeout(Duration::from_secs(50));
        let remaining = deadline.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(5));
    }
}

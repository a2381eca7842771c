//! Background queue for batch analyses.

use crate::core::BatchError;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of analyses allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

#[derive(Debug, Default)]
struct Counters {
    active: AtomicU64,
    pending: AtomicU64,
    completed: AtomicU64,
}

/// A bounded queue of detached analysis jobs.
///
/// Jobs are spawned on the runtime captured at construction and wait for a
/// semaphore permit before running, so at most `max_concurrent` analyses
/// execute at once.
#[derive(Debug, Clone)]
pub struct AnalysisQueue {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    counters: Arc<Counters>,
}

impl AnalysisQueue {
    /// Creates a queue on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when called outside a tokio runtime.
    pub fn new(max_concurrent: usize) -> Result<Self, BatchError> {
        let handle = Handle::try_current().map_err(|e| BatchError::Configuration {
            message: format!("analysis queue needs a tokio runtime: {e}"),
        })?;
        Ok(Self::with_handle(handle, max_concurrent))
    }

    /// Creates a queue that spawns onto `handle`.
    pub fn with_handle(handle: Handle, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the maximum number of concurrent analyses.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the number of analyses running now.
    pub fn active_count(&self) -> u64 {
        self.counters.active.load(Ordering::Relaxed)
    }

    /// Returns the number of analyses waiting for a permit.
    pub fn pending_count(&self) -> u64 {
        self.counters.pending.load(Ordering::Relaxed)
    }

    /// Returns the number of analyses that have finished.
    pub fn completed_count(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Returns true if every permit is taken.
    pub fn is_full(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Submits a job; it runs in the background once a permit is free.
    pub fn submit<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let counters = Arc::clone(&self.counters);
        counters.pending.fetch_add(1, Ordering::SeqCst);

        self.handle.spawn(async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = permits.acquire_owned().await.ok();
            counters.pending.fetch_sub(1, Ordering::SeqCst);
            counters.active.fetch_add(1, Ordering::SeqCst);

            job.await;

            counters.active.fetch_sub(1, Ordering::SeqCst);
            counters.completed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

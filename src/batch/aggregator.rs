//! The batch aggregator.

use crate::batch::analyzer::{Analyzer, SummaryAnalyzer};
use crate::batch::model::{AnalysisResult, Batch, BatchStatus, DEFAULT_EXPECTED_COUNT};
use crate::batch::queue::{AnalysisQueue, DEFAULT_MAX_CONCURRENT};
use crate::batch::store::{BatchSlot, BatchStore, InMemoryBatchStore};
use crate::core::{BatchError, BatchResult};

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// What a contribution did to its batch.
///
/// Late and duplicate contributions are not errors; they are reported here
/// so callers can log them.
///
/// If an earlier analysis of a full batch panicked, the next contribution
/// to it queues the analysis again, whatever its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionOutcome {
    /// The payload was stored.
    Recorded,
    /// The payload was stored and completed the batch; analysis was queued.
    AnalysisTriggered,
    /// The source had already contributed; nothing changed.
    Duplicate,
    /// Every expected source has contributed and analysis is pending.
    BatchFull,
    /// The batch is already complete; nothing changed.
    AlreadyComplete,
}

impl ContributionOutcome {
    /// Returns the outcome name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::AnalysisTriggered => "analysis_triggered",
            Self::Duplicate => "duplicate",
            Self::BatchFull => "batch_full",
            Self::AlreadyComplete => "already_complete",
        }
    }

    /// Returns `true` if the payload was stored.
    pub fn was_recorded(&self) -> bool {
        matches!(self, Self::Recorded | Self::AnalysisTriggered)
    }
}

/// Configuration for the batch aggregator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Distinct sources that complete a batch.
    pub expected_count: usize,

    /// Maximum analyses running at once.
    pub max_concurrent_analyses: usize,

    /// Polling interval of [`BatchAggregator::wait_for_analysis`].
    pub poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            expected_count: DEFAULT_EXPECTED_COUNT,
            max_concurrent_analyses: DEFAULT_MAX_CONCURRENT,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl BatchConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of sources that complete a batch.
    pub fn with_expected_count(mut self, count: usize) -> Self {
        self.expected_count = count.max(1);
        self
    }

    /// Sets the analysis concurrency limit.
    pub fn with_max_concurrent_analyses(mut self, max: usize) -> Self {
        self.max_concurrent_analyses = max.max(1);
        self
    }

    /// Sets the polling interval used while waiting for analysis.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Builder for creating a `BatchAggregator`.
#[derive(Debug, Default)]
pub struct BatchAggregatorBuilder {
    store: Option<Arc<dyn BatchStore>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    handle: Option<Handle>,
    config: BatchConfig,
}

impl BatchAggregatorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch store.
    pub fn with_store<S: BatchStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets the analyzer.
    pub fn with_analyzer<A: Analyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzer = Some(Arc::new(analyzer));
        self
    }

    /// Sets a shared analyzer.
    pub fn with_arc_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Spawns analyses on `handle` instead of the current runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the aggregator.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no runtime handle was given and none is
    /// current.
    pub fn build(self) -> BatchResult<BatchAggregator> {
        let queue = match self.handle {
            Some(handle) => AnalysisQueue::with_handle(handle, self.config.max_concurrent_analyses),
            None => AnalysisQueue::new(self.config.max_concurrent_analyses)?,
        };

        Ok(BatchAggregator {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryBatchStore::new())),
            analyzer: self
                .analyzer
                .unwrap_or_else(|| Arc::new(SummaryAnalyzer::new())),
            queue,
            config: self.config,
        })
    }
}

/// Collects per-source contributions into batches and analyses each batch
/// exactly once.
///
/// The first contributor to a batch identifier owns the batch; every later
/// contribution or read must come from the same owner. Once the expected
/// number of distinct sources has arrived, an analysis job is queued in the
/// background and its result becomes visible through [`get_batch`].
///
/// [`get_batch`]: BatchAggregator::get_batch
///
/// # Example
///
/// ```rust,ignore
/// use scanrelay::batch::BatchAggregator;
/// use serde_json::json;
///
/// let aggregator = BatchAggregator::builder().build()?;
/// for source in ["api_a", "api_b", "api_c", "api_d", "api_e"] {
///     aggregator.contribute("alice", "batch-1", source, json!({"ok": true}))?;
/// }
/// let analysis = aggregator
///     .wait_for_analysis("alice", "batch-1", std::time::Duration::from_secs(5))
///     .await?;
/// assert_eq!(analysis.summary, "Processed 5 sources");
/// ```
#[derive(Debug)]
pub struct BatchAggregator {
    store: Arc<dyn BatchStore>,
    analyzer: Arc<dyn Analyzer>,
    queue: AnalysisQueue,
    config: BatchConfig,
}

impl BatchAggregator {
    /// Creates a new builder.
    pub fn builder() -> BatchAggregatorBuilder {
        BatchAggregatorBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns the analysis queue.
    pub fn queue(&self) -> &AnalysisQueue {
        &self.queue
    }

    /// Records `payload` from `source` into the batch.
    ///
    /// Returns without waiting for any analysis it triggers.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if `owner_id` is empty.
    /// - `Validation` if `batch_id` or `source` is empty.
    /// - `Ownership` if the batch belongs to someone else.
    pub fn contribute(
        &self,
        owner_id: &str,
        batch_id: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> BatchResult<ContributionOutcome> {
        validate_identity(owner_id, batch_id)?;
        if source.trim().is_empty() {
            return Err(BatchError::validation("source must not be empty"));
        }

        let expected = self.config.expected_count;
        let slot = self
            .store
            .get_or_insert_with(batch_id, &|| Batch::new(batch_id, owner_id, expected));

        let (outcome, trigger) = {
            let mut state = slot.lock();
            if state.batch.owner_id != owner_id {
                return Err(BatchError::Ownership {
                    batch_id: batch_id.to_string(),
                });
            }

            if state.batch.is_complete() {
                (ContributionOutcome::AlreadyComplete, false)
            } else {
                let recorded = !state.batch.results.contains_key(source) && !state.batch.is_full();
                if recorded {
                    state.batch.results.insert(source.to_string(), payload);
                }

                // A full batch without a running analysis (first fill, or a
                // failed earlier attempt) is analysed now.
                let trigger = state.batch.is_full() && !state.analysis_started;
                if trigger {
                    state.analysis_started = true;
                }

                let outcome = match (recorded, trigger) {
                    (true, true) => ContributionOutcome::AnalysisTriggered,
                    (true, false) => ContributionOutcome::Recorded,
                    (false, _) if state.batch.results.contains_key(source) => {
                        ContributionOutcome::Duplicate
                    }
                    (false, _) => ContributionOutcome::BatchFull,
                };
                (outcome, trigger)
            }
        };

        if trigger {
            self.schedule_analysis(batch_id, slot);
        }

        tracing::debug!(
            batch_id = %batch_id,
            source = %source,
            outcome = outcome.as_str(),
            "Contribution processed"
        );
        crate::audit::emit_contribution(batch_id, owner_id, source, &outcome);

        Ok(outcome)
    }

    fn schedule_analysis(&self, batch_id: &str, slot: Arc<BatchSlot>) {
        let analyzer = Arc::clone(&self.analyzer);
        let batch_id = batch_id.to_string();

        tracing::info!(batch_id = %batch_id, "Batch complete, queueing analysis");

        self.queue.submit(async move {
            let results = slot.lock().batch.results.clone();

            let analysis = AssertUnwindSafe(analyzer.analyze(&batch_id, &results))
                .catch_unwind()
                .await;

            let Ok(result) = analysis else {
                tracing::error!(
                    batch_id = %batch_id,
                    "Batch analysis panicked; the next contribution retries it"
                );
                slot.lock().analysis_started = false;
                return;
            };

            let owner_id = {
                let mut state = slot.lock();
                state.batch.analysis_result = Some(result.clone());
                state.batch.status = BatchStatus::Complete;
                state.batch.owner_id.clone()
            };

            crate::audit::emit_analysis_completed(&batch_id, &owner_id, &result);
        });
    }

    /// Returns a copy of the batch.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` / `Validation` for missing inputs.
    /// - `NotFound` if no batch has this identifier.
    /// - `Ownership` if the batch belongs to someone else.
    pub fn get_batch(&self, owner_id: &str, batch_id: &str) -> BatchResult<Batch> {
        validate_identity(owner_id, batch_id)?;

        let slot = self.store.get(batch_id).ok_or_else(|| BatchError::NotFound {
            batch_id: batch_id.to_string(),
        })?;

        let batch = slot.snapshot();
        if batch.owner_id != owner_id {
            return Err(BatchError::Ownership {
                batch_id: batch_id.to_string(),
            });
        }
        Ok(batch)
    }

    /// Waits until the batch's analysis is available.
    ///
    /// # Errors
    ///
    /// Any [`get_batch`](Self::get_batch) error, or `AnalysisTimeout` if the
    /// analysis is not committed within `timeout`.
    pub async fn wait_for_analysis(
        &self,
        owner_id: &str,
        batch_id: &str,
        timeout: Duration,
    ) -> BatchResult<AnalysisResult> {
        tokio::time::timeout(timeout, self.poll_analysis(owner_id, batch_id))
            .await
            .unwrap_or_else(|_| {
                Err(BatchError::AnalysisTimeout {
                    batch_id: batch_id.to_string(),
                })
            })
    }

    async fn poll_analysis(&self, owner_id: &str, batch_id: &str) -> BatchResult<AnalysisResult> {
        loop {
            let batch = self.get_batch(owner_id, batch_id)?;
            if let Some(result) = batch.analysis_result {
                return Ok(result);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Number of batches held.
    pub fn batch_count(&self) -> usize {
        self.store.len()
    }
}

fn validate_identity(owner_id: &str, batch_id: &str) -> BatchResult<()> {
    if owner_id.trim().is_empty() {
        return Err(BatchError::Unauthenticated);
    }
    if batch_id.trim().is_empty() {
        return Err(BatchError::validation("batch id must not be empty"));
    }
    Ok(())
}

//! Multi-source batch aggregation.
//!
//! Independent sources contribute partial results under a shared batch
//! identifier. Once the expected number of distinct sources has arrived,
//! the batch is analysed exactly once in the background:
//!
//! - [`BatchAggregator`] - ownership, idempotent contributions, triggering
//! - [`BatchStore`] / [`InMemoryBatchStore`] - per-batch locked storage
//! - [`Analyzer`] / [`SummaryAnalyzer`] - the one-time analysis
//! - [`AnalysisQueue`] - bounded background execution

pub mod aggregator;
pub mod analyzer;
pub mod model;
pub mod queue;
pub mod store;

pub use aggregator::{BatchAggregator, BatchAggregatorBuilder, BatchConfig, ContributionOutcome};
pub use analyzer::{Analyzer, SummaryAnalyzer, MAX_RISK_SCORE};
pub use model::{AnalysisResult, Batch, BatchStatus, DEFAULT_EXPECTED_COUNT};
pub use queue::{AnalysisQueue, DEFAULT_MAX_CONCURRENT};
pub use store::{BatchSlot, BatchStore, InMemoryBatchStore};

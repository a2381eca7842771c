//! Batch data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of distinct sources that complete a batch.
pub const DEFAULT_EXPECTED_COUNT: usize = 5;

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Collecting contributions or analysing.
    Processing,
    /// Analysis finished; the batch no longer changes.
    Complete,
}

impl BatchStatus {
    /// Returns the status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

/// Result of the one-time analysis of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Unique analysis identifier.
    pub analysis_id: Uuid,
    /// Human-readable summary.
    pub summary: String,
    /// Contributions keyed by source, as analysed.
    pub sources: BTreeMap<String, serde_json::Value>,
    /// Aggregate risk score, 0-10.
    pub risk_score: f64,
    /// When the analysis finished.
    pub completed_at: DateTime<Utc>,
}

/// Partial results contributed under one batch identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier chosen by the callers.
    pub batch_id: String,
    /// Identity of the first contributor.
    pub owner_id: String,
    /// Sources needed to trigger analysis.
    pub expected_count: usize,
    /// Contributions keyed by source; each source appears at most once.
    pub results: BTreeMap<String, serde_json::Value>,
    /// Lifecycle status.
    pub status: BatchStatus,
    /// Set once the analysis has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<AnalysisResult>,
    /// When the first contribution arrived.
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Creates an empty batch owned by `owner_id`.
    pub fn new(batch_id: impl Into<String>, owner_id: impl Into<String>, expected_count: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            owner_id: owner_id.into(),
            expected_count,
            results: BTreeMap::new(),
            status: BatchStatus::Processing,
            analysis_result: None,
            created_at: Utc::now(),
        }
    }

    /// Number of distinct sources received.
    pub fn received_count(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` once the analysis has been committed.
    pub fn is_complete(&self) -> bool {
        self.status == BatchStatus::Complete
    }

    /// Returns `true` once every expected source has contributed.
    pub fn is_full(&self) -> bool {
        self.received_count() >= self.expected_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_batch() {
        let batch = Batch::new("b-1", "alice", DEFAULT_EXPECTED_COUNT);
        assert_eq!(batch.received_count(), 0);
        assert_eq!(batch.status, BatchStatus::Processing);
        assert!(!batch.is_full());
        assert!(!batch.is_complete());
    }

    #[test]
    fn test_serialized_shape() {
        let mut batch = Batch::new("b-1", "alice", 1);
        batch.results.insert("api_a".into(), serde_json::json!({"ok": true}));
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["results"]["api_a"]["ok"], true);
        assert!(json.get("analysis_result").is_none());
    }
}

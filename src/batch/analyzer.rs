//! Batch analysis.

use crate::batch::model::AnalysisResult;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use uuid::Uuid;

/// Payload fields read as risk indicators, in order of preference.
const RISK_FIELDS: [&str; 2] = ["risk_score", "severity"];

/// Highest risk score an analysis reports.
pub const MAX_RISK_SCORE: f64 = 10.0;

/// Computes the one-time analysis of a complete batch.
///
/// Implementations receive a snapshot of the contributions and must not
/// assume any lock is held.
#[async_trait]
pub trait Analyzer: Send + Sync + Debug {
    /// Analyses the contributions of `batch_id`.
    async fn analyze(
        &self,
        batch_id: &str,
        results: &BTreeMap<String, serde_json::Value>,
    ) -> AnalysisResult;
}

/// Default analyzer: a summary line plus the highest risk indicator found.
///
/// The risk score is the largest numeric `risk_score` (or `severity`) field
/// across the top level of every payload, clamped to 0-10. Payloads without
/// one contribute 0.
#[derive(Debug, Clone, Default)]
pub struct SummaryAnalyzer {
    processing_delay: Duration,
}

impl SummaryAnalyzer {
    /// Creates an analyzer with no artificial delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed delay before the result is produced.
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    fn payload_risk(payload: &serde_json::Value) -> Option<f64> {
        RISK_FIELDS
            .iter()
            .find_map(|field| payload.get(field).and_then(serde_json::Value::as_f64))
            .filter(|score| score.is_finite())
    }
}

#[async_trait]
impl Analyzer for SummaryAnalyzer {
    async fn analyze(
        &self,
        batch_id: &str,
        results: &BTreeMap<String, serde_json::Value>,
    ) -> AnalysisResult {
        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        let risk_score = results
            .values()
            .filter_map(Self::payload_risk)
            .fold(0.0_f64, f64::max)
            .clamp(0.0, MAX_RISK_SCORE);

        tracing::debug!(batch_id = %batch_id, sources = results.len(), risk_score, "Batch analysed");

        AnalysisResult {
            analysis_id: Uuid::new_v4(),
            summary: format!("Processed {} sources", results.len()),
            sources: results.clone(),
            risk_score,
            completed_at: Utc::now(),
        }
    }
}

//! Batch fan-in example.
//!
//! This example shows how to:
//! - Contribute results from several sources under one batch identifier
//! - Observe idempotent and late contributions
//! - Wait for the one-time analysis
//!
//! Run with: cargo run --example batch_fan_in

use scanrelay::api::{AnalysisResponse, ContributionReceipt, FanInSource};
use scanrelay::prelude::*;
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Scanrelay Batch Fan-In Example ===\n");

    let aggregator = BatchAggregator::builder()
        .with_analyzer(SummaryAnalyzer::new().with_processing_delay(Duration::from_millis(200)))
        .build()?;

    let owner = "user-123";
    let batch_id = "batch-42";

    for (i, source) in FanInSource::ALL.iter().enumerate() {
        let payload = source.payload(Some(json!({ "risk_score": i as f64 * 1.5 })));
        let outcome = aggregator.contribute(owner, batch_id, source.as_str(), payload)?;
        let receipt = ContributionReceipt::new(*source, batch_id, outcome);
        println!("{} -> {}", serde_json::to_string(&receipt)?, outcome.as_str());
    }

    // Repeating a source changes nothing
    let outcome = aggregator.contribute(owner, batch_id, "api_a", json!({"risk_score": 10}))?;
    println!("api_a again -> {}", outcome.as_str());

    // Someone else cannot touch the batch
    if let Err(e) = aggregator.get_batch("intruder", batch_id) {
        println!("intruder -> {} ({})", e, e.kind().http_status());
    }

    let analysis = aggregator
        .wait_for_analysis(owner, batch_id, Duration::from_secs(5))
        .await?;
    println!("\nAnalysis {}: {} (risk {:.1})", analysis.analysis_id, analysis.summary, analysis.risk_score);

    let response = AnalysisResponse::from(aggregator.get_batch(owner, batch_id)?);
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

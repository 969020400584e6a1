//! Demo binary for query-orchestrator.
//!
//! Builds a pipeline over in-memory collaborators and runs a few queries in
//! both batch and streaming mode.
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter (default: info)

use query_orchestrator::config::AppConfig;
use query_orchestrator::{
    init_tracing, metrics, Backend, EchoGenerator, OperatingMode, PipelineResult, QueryPipeline,
    QueryRequest, RetrievedDocument, StaticRetriever,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing (JSON or pretty, based on LOG_FORMAT env)
    let _ = init_tracing();

    // Initialize Prometheus metrics registry before running any queries.
    metrics::init_metrics()?;

    info!(started_at = %chrono::Utc::now().to_rfc3339(), "Starting query-orchestrator demo");

    let config = AppConfig::default();

    let retriever = Arc::new(StaticRetriever::new(vec![
        RetrievedDocument::new(
            "Report suites collect and organise analytics data for a property.",
            0.82,
            "kb://docs/report-suites",
        ),
        RetrievedDocument::new(
            "Attribution models assign credit for conversions across touchpoints.",
            0.74,
            "kb://docs/attribution",
        ),
        RetrievedDocument::new(
            "Segments filter collected hits by visitor, visit, or hit scope.",
            0.61,
            "kb://docs/segments",
        ),
    ]));
    let generator = Arc::new(EchoGenerator::new().with_delay(10));

    let pipeline = QueryPipeline::new(&config, retriever, generator);

    let demo_queries = [
        ("What is a report suite?", OperatingMode::Tiered),
        (
            "Compare last-touch and algorithmic attribution models",
            OperatingMode::Tiered,
        ),
        (
            "Recommend a long-term measurement strategy",
            OperatingMode::Tiered,
        ),
        (
            "Recommend a long-term measurement strategy",
            OperatingMode::CostSaving,
        ),
    ];

    for (text, mode) in demo_queries {
        let request = QueryRequest::new(text)
            .with_mode(mode)
            .with_available_backends(vec![Backend::Fast, Backend::Balanced]);
        match pipeline.run(&request).await {
            PipelineResult::Ok(output) => info!(
                backend = output.routing.backend.as_str(),
                reasoning = %output.routing.reasoning,
                answer_len = output.answer.len(),
                "batch query answered"
            ),
            PipelineResult::Err(failure) => info!(error = %failure.error, "batch query failed"),
        }
    }

    // Streaming run: snapshots arrive in generation order; the final
    // emission has an empty answer and is_streaming = false.
    let request = QueryRequest::new("How does segment stacking interact with virtual report suites?");
    let mut rx = pipeline.run_streaming(request);
    let mut snapshots = 0usize;
    while let Some(snapshot) = rx.recv().await {
        snapshots += 1;
        if !snapshot.is_streaming {
            info!(
                snapshots,
                success = snapshot.success,
                "stream finished"
            );
        }
    }

    let session = pipeline.session_metrics().snapshot();
    info!(
        queries = session.queries,
        cache_hits = session.cache_hits,
        fast_requests = session.fast_requests,
        balanced_requests = session.balanced_requests,
        savings_usd = session.savings_usd,
        "session summary"
    );

    info!("Demo complete");
    Ok(())
}

//! Batch query demo.
//!
//! Run with: `cargo run --example batch_query`

use query_orchestrator::config::AppConfig;
use query_orchestrator::{
    init_tracing, EchoGenerator, PipelineResult, QueryPipeline, QueryRequest, RetrievedDocument,
    StaticRetriever,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = init_tracing();

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
    ]));
    let generator = Arc::new(EchoGenerator::new().with_delay(10));
    let pipeline = QueryPipeline::new(&AppConfig::default(), retriever, generator);

    for text in [
        "What is a report suite?",
        "Compare last-touch and algorithmic attribution models",
        "Recommend a long-term measurement strategy",
    ] {
        match pipeline.run(&QueryRequest::new(text)).await {
            PipelineResult::Ok(output) => {
                println!("query:     {text}");
                println!("backend:   {}", output.routing.backend.as_str());
                println!("reasoning: {}", output.routing.reasoning);
                println!("answer:    {}\n", output.answer);
            }
            PipelineResult::Err(failure) => {
                println!("query:  {text}");
                println!("error:  {}\n", failure.error);
            }
        }
    }

    let session = pipeline.session_metrics().snapshot();
    println!(
        "session: {} queries, {} cache hits, ${:.6} saved",
        session.queries, session.cache_hits, session.savings_usd
    );
    Ok(())
}

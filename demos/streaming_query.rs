//! Streaming query demo.
//!
//! Run with: `cargo run --example streaming_query`

use query_orchestrator::config::AppConfig;
use query_orchestrator::{
    init_tracing, EchoGenerator, QueryPipeline, QueryRequest, RetrievedDocument, StaticRetriever,
};
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = init_tracing();

    let retriever = Arc::new(StaticRetriever::new(vec![RetrievedDocument::new(
        "Segments filter collected hits by visitor, visit, or hit scope.",
        0.61,
        "kb://docs/segments",
    )]));
    let generator = Arc::new(EchoGenerator::new().with_delay(50));
    let pipeline = QueryPipeline::new(&AppConfig::default(), retriever, generator);

    let mut rx = pipeline.run_streaming(QueryRequest::new(
        "How does segment stacking interact with virtual report suites?",
    ));

    let mut printed = 0usize;
    while let Some(snapshot) = rx.recv().await {
        if snapshot.is_streaming {
            // Print only the tail this snapshot added.
            print!("{}", &snapshot.answer[printed..]);
            printed = snapshot.answer.len();
            std::io::stdout().flush()?;
        } else if let Some(error) = snapshot.error {
            println!("\n[stream failed: {error}]");
        } else {
            // Final emission: empty answer by contract, nothing to print.
            println!();
            if let Some(routing) = snapshot.routing {
                println!("served by: {}", routing.backend.as_str());
            }
        }
    }
    Ok(())
}

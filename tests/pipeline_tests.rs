//! Batch pipeline integration tests.
//!
//! Exercises the full Validate → Retrieve → Route → AssembleContext →
//! Generate → Package sequence over in-memory collaborators, including the
//! layered fallback paths (baseline retrieval retry, fast-backend downgrade)
//! and the batch result cache.

use query_orchestrator::config::AppConfig;
use query_orchestrator::{
    Backend, EchoGenerator, OperatingMode, PipelineError, PipelineResult, QueryPipeline,
    QueryRequest, RetrievedDocument, StaticRetriever,
};
use std::sync::Arc;

fn sample_docs() -> Vec<RetrievedDocument> {
    vec![
        RetrievedDocument::new("Report suites collect analytics data.", 0.82, "kb://a"),
        RetrievedDocument::new("Attribution models assign credit.", 0.74, "kb://b"),
        RetrievedDocument::new("Segments filter collected hits.", 0.61, "kb://c"),
    ]
}

fn pipeline_with(retriever: StaticRetriever, generator: EchoGenerator) -> QueryPipeline {
    QueryPipeline::new(
        &AppConfig::default(),
        Arc::new(retriever),
        Arc::new(generator),
    )
}

fn default_pipeline() -> QueryPipeline {
    pipeline_with(StaticRetriever::new(sample_docs()), EchoGenerator::new())
}

fn fast_id() -> String {
    AppConfig::default().routing.backends.fast
}

fn balanced_id() -> String {
    AppConfig::default().routing.backends.balanced
}

// ── Happy path ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_simple_query_routes_fast_and_answers() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(&QueryRequest::new("Is the dashboard live"))
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected success".to_string());
    };
    assert_eq!(output.routing.backend, Backend::Fast);
    assert!(output.answer.starts_with(&format!("[{}]", fast_id())));
    assert_eq!(output.documents.len(), 3);
    assert!(output.context.docs_used >= 1);
}

#[tokio::test]
async fn test_analytical_query_routes_balanced() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(&QueryRequest::new(
            "Compare last-touch and algorithmic attribution",
        ))
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected success".to_string());
    };
    assert_eq!(output.routing.backend, Backend::Balanced);
    assert!(output.answer.starts_with(&format!("[{}]", balanced_id())));
}

#[tokio::test]
async fn test_cost_saving_mode_forces_fast() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(
            &QueryRequest::new("Recommend the best long-term strategy")
                .with_mode(OperatingMode::CostSaving),
        )
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected success".to_string());
    };
    assert_eq!(output.routing.backend, Backend::Fast);
    assert!(output.routing.reasoning.contains("cost-saving"));
}

#[tokio::test]
async fn test_downgrade_recorded_when_most_capable_missing() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(
            &QueryRequest::new("Recommend the best long-term strategy")
                .with_available_backends(vec![Backend::Fast, Backend::Balanced]),
        )
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected success".to_string());
    };
    assert_eq!(output.routing.backend, Backend::Balanced);
    assert!(output.routing.reasoning.contains("downgraded to balanced"));
}

// ── Validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_query_fails_validation() {
    let pipeline = default_pipeline();
    let result = pipeline.run(&QueryRequest::new("   ")).await;

    assert!(!result.is_success());
    assert!(matches!(
        result.error(),
        Some(PipelineError::Validation(_))
    ));
    assert!(result.documents().is_empty(), "validation precedes retrieval");
}

#[tokio::test]
async fn test_over_cap_query_fails_validation() {
    let pipeline = default_pipeline();
    let huge = "word ".repeat(5_000); // 25 000 chars, over the 20 000 cap
    let result = pipeline.run(&QueryRequest::new(huge)).await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::Validation(_))
    ));
}

// ── Retrieval fallback ─────────────────────────────────────────────────

#[tokio::test]
async fn test_enhanced_failure_falls_back_to_baseline() {
    let pipeline = pipeline_with(
        StaticRetriever::new(sample_docs()).with_failing_enhanced(),
        EchoGenerator::new(),
    );
    let result = pipeline
        .run(&QueryRequest::new("What is a report suite?"))
        .await;

    assert!(result.is_success(), "baseline retry must rescue the run");
    assert_eq!(result.documents().len(), 3);
}

#[tokio::test]
async fn test_double_retrieval_failure_is_terminal() {
    let pipeline = pipeline_with(
        StaticRetriever::new(sample_docs()).with_failing_baseline(),
        EchoGenerator::new(),
    );
    let result = pipeline
        .run(&QueryRequest::new("What is a report suite?"))
        .await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::Retrieval(_))
    ));
}

// ── Generation downgrade ───────────────────────────────────────────────

#[tokio::test]
async fn test_access_denied_retries_on_fast_backend() {
    // Balanced is routed but denied; the run must complete on Fast.
    let pipeline = pipeline_with(
        StaticRetriever::new(sample_docs()),
        EchoGenerator::new().with_denied_backend(balanced_id()),
    );
    let result = pipeline
        .run(&QueryRequest::new(
            "Compare last-touch and algorithmic attribution",
        ))
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected downgrade to rescue the run".to_string());
    };
    // The routing decision still names Balanced; the answer came from Fast.
    assert_eq!(output.routing.backend, Backend::Balanced);
    assert!(output.answer.starts_with(&format!("[{}]", fast_id())));

    let session = pipeline.session_metrics().snapshot();
    assert_eq!(session.fast_requests, 1);
    assert_eq!(session.balanced_requests, 0);
}

#[tokio::test]
async fn test_access_denied_on_both_backends_is_terminal() {
    let pipeline = pipeline_with(
        StaticRetriever::new(sample_docs()),
        EchoGenerator::new()
            .with_denied_backend(balanced_id())
            .with_denied_backend(fast_id()),
    );
    let result = pipeline
        .run(&QueryRequest::new(
            "Compare last-touch and algorithmic attribution",
        ))
        .await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::BackendUnavailable(_))
    ));
    // Partial documents are preserved for diagnostics.
    assert_eq!(result.documents().len(), 3);
}

// ── Router contract ────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_availability_set_fails_without_panic() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(&QueryRequest::new("What is a report suite?").with_available_backends(vec![]))
        .await;

    assert!(!result.is_success());
    let message = result
        .error()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(message.contains("no backends"));
}

// ── Cache behavior ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_identical_query_hits_cache() {
    let pipeline = default_pipeline();
    let request = QueryRequest::new("What is a report suite?");

    let first = pipeline.run(&request).await;
    let second = pipeline.run(&request).await;
    assert_eq!(first, second);

    let session = pipeline.session_metrics().snapshot();
    assert_eq!(session.queries, 2);
    assert_eq!(session.cache_hits, 1);
    assert_eq!(session.cache_misses, 1);
    // Only one generation happened; the second answer came from the cache.
    assert_eq!(
        session.fast_requests + session.balanced_requests + session.most_capable_requests,
        1
    );
}

#[tokio::test]
async fn test_cache_key_ignores_case_and_spacing() {
    let pipeline = default_pipeline();
    let _ = pipeline
        .run(&QueryRequest::new("What is a report suite?"))
        .await;
    let _ = pipeline
        .run(&QueryRequest::new("  what   IS a report suite?  "))
        .await;

    let session = pipeline.session_metrics().snapshot();
    assert_eq!(session.cache_hits, 1);
}

#[tokio::test]
async fn test_failures_are_never_cached() {
    let pipeline = pipeline_with(
        StaticRetriever::new(sample_docs()).with_failing_baseline(),
        EchoGenerator::new(),
    );
    let request = QueryRequest::new("What is a report suite?");

    let _ = pipeline.run(&request).await;
    let _ = pipeline.run(&request).await;

    assert!(pipeline.cache().is_empty(), "failed runs must not be cached");
    let session = pipeline.session_metrics().snapshot();
    assert_eq!(session.cache_hits, 0);
    assert_eq!(session.failures, 2);
}

// ── Diagnostics carried on success ─────────────────────────────────────

#[tokio::test]
async fn test_output_carries_assessment_and_context_stats() {
    let pipeline = default_pipeline();
    let result = pipeline
        .run(&QueryRequest::new(
            "How do I troubleshoot the security configuration of my integration?",
        ))
        .await;

    let PipelineResult::Ok(output) = result else {
        std::panic::panic_any("expected success".to_string());
    };
    assert!(output.assessment.score >= 5);
    assert_eq!(output.context.tier_used, output.assessment.tier);
    assert!(output.context.docs_used <= 3);
    assert!(!output.routing.reasoning.is_empty());
}

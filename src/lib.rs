//! # query-orchestrator
//!
//! An adaptive query-routing and context-assembly pipeline over Tokio.
//!
//! ## Architecture
//!
//! Six-stage pipeline with layered fallback semantics:
//! ```text
//! Query → Validate → Retrieve → Route → AssembleContext → Generate → Package
//! ```
//!
//! A query is classified for complexity, routed to one of three generation
//! backends (Fast / Balanced / MostCapable) based on complexity and retrieval
//! relevance, given a size-bounded context assembled from retrieved documents,
//! and answered either in one shot (batch, cached) or as an ordered sequence
//! of streaming snapshots.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod cache;
pub mod classify;
pub mod config;
pub mod context;
pub mod generation;
pub mod metrics;
pub mod pipeline;
pub mod retrieval;
pub mod routing;
pub mod session;

// Re-exports for convenience
pub use cache::ExpiringCache;
pub use classify::{ComplexityAssessment, ComplexityClassifier, ComplexityTier, LengthClass};
pub use context::{ContextAssembler, ContextBundle, ContextStats};
pub use generation::{AnthropicGenerator, EchoGenerator, GenerateError, Generator};
pub use pipeline::{
    PipelineFailure, PipelineOutput, PipelineResult, QueryPipeline, QueryRequest, StreamSnapshot,
};
pub use retrieval::{HttpRetriever, RetrievalError, Retriever, StaticRetriever};
pub use routing::{Backend, ModelRouter, OperatingMode, RouterError, RoutingDecision};
pub use session::SessionMetrics;

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`PipelineError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```no_run
/// # use query_orchestrator::{init_tracing, PipelineError};
/// # fn example() -> Result<(), PipelineError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), PipelineError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| PipelineError::Other(format!("tracing init failed: {e}")))
}

/// Top-level pipeline errors.
///
/// One variant per failure class in the pipeline's error taxonomy. Each
/// pipeline stage recovers only the class it owns (retrieval falls back to
/// the baseline path once, generation downgrades to the fast backend once);
/// everything else is terminal and is captured into a
/// [`PipelineFailure`](crate::pipeline::PipelineFailure) rather than escaping
/// the pipeline boundary.
///
/// All variants implement `std::error::Error` via [`thiserror`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The query failed validation (empty, too short, or over the length
    /// cap). Terminal and user-facing; never retried.
    #[error("invalid query: {0}")]
    Validation(String),

    /// Document retrieval failed after the baseline fallback attempt.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The chosen backend was not accessible and the fast-backend downgrade
    /// retry also failed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Generation failed with a non-entitlement error (malformed prompt,
    /// quota, transport). Terminal, no retry.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A configuration value is missing or invalid (e.g., missing env var).
    ///
    /// This is returned at construction time so that misconfiguration
    /// surfaces immediately rather than at the first query.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit a specific variant. The message
    /// is generic by design so internal detail never leaks to callers.
    #[error("{0}")]
    Other(String),
}

/// A document returned by the retrieval collaborator.
///
/// Owned by the retrieval service; read-only to this crate. Ordering is
/// whatever the retrieval service ranked — the context assembler never
/// re-ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    /// Full document text as returned by retrieval.
    pub text: String,
    /// Relevance score in `[0.0, 1.0]` assigned by the retrieval service.
    pub relevance_score: f64,
    /// Opaque locator for the document source (URI, object key, …).
    pub source_locator: String,
}

impl RetrievedDocument {
    /// Create a new document.
    pub fn new(
        text: impl Into<String>,
        relevance_score: f64,
        source_locator: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            relevance_score,
            source_locator: source_locator.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_includes_message() {
        let err = PipelineError::Validation("query is empty".to_string());
        assert!(err.to_string().contains("query is empty"));
    }

    #[test]
    fn test_backend_unavailable_display_prefix() {
        let err = PipelineError::BackendUnavailable("403".to_string());
        assert!(err.to_string().starts_with("backend unavailable"));
    }

    #[test]
    fn test_error_variants_are_cloneable_and_comparable() {
        let a = PipelineError::Retrieval("kb down".to_string());
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_retrieved_document_new_stores_fields() {
        let doc = RetrievedDocument::new("body", 0.75, "s3://bucket/doc.md");
        assert_eq!(doc.text, "body");
        assert!((doc.relevance_score - 0.75).abs() < f64::EPSILON);
        assert_eq!(doc.source_locator, "s3://bucket/doc.md");
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        // First call may succeed or fail depending on test execution order
        // (another test may have already installed a subscriber).
        let _ = init_tracing();
        // Second call must not panic — it should return Err.
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}

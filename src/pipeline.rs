//! Query pipeline orchestration.
//!
//! Sequences `Validate → Retrieve → Route → AssembleContext → Generate →
//! Package` in two driver modes:
//!
//! - **Batch** ([`QueryPipeline::run`]): runs to completion, consults the
//!   result cache before validation, and caches the packaged result on
//!   success only — cancelled or failed runs never pollute the cache.
//! - **Streaming** ([`QueryPipeline::run_streaming`]): skips the cache and
//!   emits a [`StreamSnapshot`] per generation chunk, `answer` accumulating
//!   across emissions. The final emission carries an **empty** `answer` and
//!   `is_streaming = false`; consumers that already rendered the chunk tail
//!   must never duplicate text, so this contract is load-bearing.
//!
//! Failure semantics per stage:
//! - `Validate`: terminal, no retry.
//! - `Retrieve`: a failed enhanced attempt falls back once to the baseline
//!   path; only a second failure is terminal.
//! - `Generate`: an access/entitlement-class error triggers exactly one
//!   retry against the guaranteed fast backend; anything else is terminal.
//!
//! Terminal failures are packaged into [`PipelineResult::Err`] with whatever
//! documents were retrieved, and never escape the pipeline boundary as
//! panics or raw errors.

use crate::cache::ExpiringCache;
use crate::classify::{ComplexityAssessment, ComplexityClassifier};
use crate::config::{AppConfig, LimitsConfig, RetrievalConfig};
use crate::context::{ContextAssembler, ContextStats};
use crate::generation::{GenerateError, Generator, TokenStream};
use crate::metrics;
use crate::retrieval::{RetrievalError, Retriever};
use crate::routing::{Backend, ModelRouter, OperatingMode, RoutingDecision};
use crate::session::{estimate_tokens, SessionMetrics};
use crate::{PipelineError, RetrievedDocument};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

/// Buffer size for the streaming snapshot channel. Consumers that fall
/// behind exert backpressure on the generation loop through this bound.
const STREAM_CHANNEL_CAPACITY: usize = 32;

// ── Request and result types ───────────────────────────────────────────

/// One query submission from the hosting layer.
///
/// The availability set reflects out-of-band health and entitlement checks
/// performed by the host; the pipeline itself enforces the query length cap
/// and never trusts the caller on it.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Raw query text.
    pub text: String,
    /// Operating mode for routing.
    pub mode: OperatingMode,
    /// Backends the host currently considers usable.
    pub available_backends: Vec<Backend>,
}

impl QueryRequest {
    /// Create a request in tiered mode with every backend available.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: OperatingMode::Tiered,
            available_backends: vec![Backend::Fast, Backend::Balanced, Backend::MostCapable],
        }
    }

    /// Override the operating mode.
    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the availability set.
    pub fn with_available_backends(mut self, backends: Vec<Backend>) -> Self {
        self.available_backends = backends;
        self
    }
}

/// Successful pipeline output. This is the value cached by the batch driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Generated answer text.
    pub answer: String,
    /// Documents the answer was grounded on, in retrieval order.
    pub documents: Vec<RetrievedDocument>,
    /// The routing decision that chose the serving backend.
    pub routing: RoutingDecision,
    /// Additive complexity assessment used for context sizing.
    pub assessment: ComplexityAssessment,
    /// Context sizing metadata.
    pub context: ContextStats,
}

/// Terminal pipeline failure. Documents retrieved before the failure are
/// preserved for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFailure {
    /// The failure, classified per the pipeline error taxonomy.
    pub error: PipelineError,
    /// Whatever was retrieved before the failure.
    pub documents: Vec<RetrievedDocument>,
    /// The routing decision, if the failure happened after routing.
    pub routing: Option<RoutingDecision>,
}

/// Terminal artifact of one batch run.
///
/// A tagged sum so the hosting layer matches exhaustively instead of
/// inspecting a success flag.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    /// The run completed and produced an answer.
    Ok(PipelineOutput),
    /// The run failed; the error and any partial documents are preserved.
    Err(PipelineFailure),
}

impl PipelineResult {
    /// `true` for [`PipelineResult::Ok`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The answer text, if the run succeeded.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Ok(output) => Some(&output.answer),
            Self::Err(_) => None,
        }
    }

    /// The failure, if the run failed.
    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Ok(_) => None,
            Self::Err(failure) => Some(&failure.error),
        }
    }

    /// Documents carried by the result, success or failure.
    pub fn documents(&self) -> &[RetrievedDocument] {
        match self {
            Self::Ok(output) => &output.documents,
            Self::Err(failure) => &failure.documents,
        }
    }
}

/// One emission from the streaming driver.
///
/// Non-final snapshots carry the cumulative answer so far and
/// `is_streaming = true`. The final snapshot carries an empty `answer` and
/// `is_streaming = false`; on failure it additionally carries the error.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    /// `false` only when the run ended in a terminal failure.
    pub success: bool,
    /// Cumulative answer text; empty on the final emission.
    pub answer: String,
    /// Documents the answer is grounded on.
    pub documents: Vec<RetrievedDocument>,
    /// Routing decision, once made.
    pub routing: Option<RoutingDecision>,
    /// Terminal error message, if the run failed.
    pub error: Option<String>,
    /// `true` while chunks are still arriving.
    pub is_streaming: bool,
}

// ── Cache key ──────────────────────────────────────────────────────────

/// Content hash of the normalized query (trimmed, lowercased, whitespace
/// collapsed), so trivially reworded resubmissions hit the same entry.
pub(crate) fn cache_key(query: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let normalized = query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    format!("query:{:x}", hasher.finish())
}

// ── Pipeline ───────────────────────────────────────────────────────────

/// Two-mode query pipeline orchestrator.
///
/// Cheap to clone: collaborators, cache, and session metrics are shared
/// behind `Arc`s, so clones observe the same cache and counters.
#[derive(Clone)]
pub struct QueryPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    router: ModelRouter,
    classifier: ComplexityClassifier,
    assembler: ContextAssembler,
    cache: Arc<ExpiringCache<String, PipelineOutput>>,
    session: Arc<SessionMetrics>,
    limits: LimitsConfig,
    retrieval: RetrievalConfig,
}

impl QueryPipeline {
    /// Build a pipeline from configuration and collaborator handles.
    pub fn new(
        config: &AppConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retriever,
            generator,
            router: ModelRouter::new(config.routing.clone()),
            classifier: ComplexityClassifier::new(),
            assembler: ContextAssembler::new(),
            cache: Arc::new(ExpiringCache::new(
                config.cache.capacity,
                Duration::from_secs(config.cache.ttl_s),
            )),
            session: Arc::new(SessionMetrics::new(&config.routing.costs)),
            limits: config.limits.clone(),
            retrieval: config.retrieval.clone(),
        }
    }

    /// Session metrics handle shared by all clones of this pipeline.
    pub fn session_metrics(&self) -> &Arc<SessionMetrics> {
        &self.session
    }

    /// Result cache shared by all clones of this pipeline.
    pub fn cache(&self) -> &Arc<ExpiringCache<String, PipelineOutput>> {
        &self.cache
    }

    // ── Batch driver ───────────────────────────────────────────────────

    /// Run one query to completion.
    ///
    /// Never panics and never returns a raw error: every failure is packaged
    /// into [`PipelineResult::Err`].
    pub async fn run(&self, request: &QueryRequest) -> PipelineResult {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("pipeline.run", request_id = %request_id, mode = ?request.mode);

        async {
            self.session.record_query();

            let key = cache_key(&request.text);
            if let Some(output) = self.cache.get(&key) {
                self.session.record_cache_hit();
                metrics::inc_cache_event("hit");
                info!(answer_len = output.answer.len(), "cache hit");
                return PipelineResult::Ok(output);
            }
            self.session.record_cache_miss();
            metrics::inc_cache_event("miss");

            let result = self.execute(request).await;
            match &result {
                PipelineResult::Ok(output) => {
                    self.cache.set(key, output.clone());
                    metrics::inc_cache_event("store");
                    info!(
                        backend = output.routing.backend.as_str(),
                        answer_len = output.answer.len(),
                        "query completed"
                    );
                }
                PipelineResult::Err(failure) => {
                    self.session.record_failure();
                    warn!(error = %failure.error, "query failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// The six-stage state machine shared conceptually with the streaming
    /// driver. Answer content is never logged — lengths only.
    async fn execute(&self, request: &QueryRequest) -> PipelineResult {
        // Stage 1: Validate.
        if let Err(message) = validate_query(&request.text, &self.limits) {
            metrics::inc_error("validate", "invalid_query");
            return PipelineResult::Err(PipelineFailure {
                error: PipelineError::Validation(message),
                documents: Vec::new(),
                routing: None,
            });
        }
        metrics::inc_stage("validate");

        // Stage 2: Retrieve, with one baseline fallback.
        let documents = match self.retrieve_with_fallback(&request.text).await {
            Ok(documents) => documents,
            Err(e) => {
                metrics::inc_error("retrieve", "retrieval_failure");
                return PipelineResult::Err(PipelineFailure {
                    error: PipelineError::Retrieval(e.0),
                    documents: Vec::new(),
                    routing: None,
                });
            }
        };
        metrics::inc_stage("retrieve");

        // Stage 3: Route.
        let decision = match self.router.route(
            &request.text,
            &documents,
            request.mode,
            &request.available_backends,
        ) {
            Ok(decision) => decision,
            Err(e) => {
                metrics::inc_error("route", "no_backends");
                return PipelineResult::Err(PipelineFailure {
                    error: PipelineError::Other(e.to_string()),
                    documents,
                    routing: None,
                });
            }
        };
        metrics::inc_stage("route");

        // Stage 4: AssembleContext, sized by the additive policy.
        let assessment = self.classifier.assess(&request.text);
        let bundle = self
            .assembler
            .assemble(assessment.tier, &documents, &request.text);
        metrics::inc_stage("assemble");

        // Stage 5: Generate, with one fast-backend downgrade on access errors.
        let start = Instant::now();
        let (answer, served) = match self
            .generate_with_downgrade(&decision, &request.text, &bundle.text)
            .await
        {
            Ok(answer) => answer,
            Err(error) => {
                return PipelineResult::Err(PipelineFailure {
                    error,
                    documents,
                    routing: Some(decision),
                });
            }
        };
        metrics::inc_stage("generate");
        metrics::record_stage_latency("generate", start.elapsed());

        self.session.record_backend(
            served,
            estimate_tokens(&request.text) + estimate_tokens(&bundle.text)
                + estimate_tokens(&answer),
        );

        // Stage 6: Package.
        metrics::inc_stage("package");
        PipelineResult::Ok(PipelineOutput {
            answer,
            documents,
            routing: decision,
            assessment,
            context: bundle.stats,
        })
    }

    // ── Streaming driver ───────────────────────────────────────────────

    /// Run one query incrementally, returning the snapshot channel.
    ///
    /// The cache is skipped entirely. Snapshots arrive in generation order;
    /// dropping the receiver abandons the run with no cleanup obligation.
    pub fn run_streaming(&self, request: QueryRequest) -> mpsc::Receiver<StreamSnapshot> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let pipeline = self.clone();
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("pipeline.stream", request_id = %request_id, mode = ?request.mode);

        tokio::spawn(
            async move {
                pipeline.drive_stream(request, tx).await;
            }
            .instrument(span),
        );
        rx
    }

    async fn drive_stream(&self, request: QueryRequest, tx: mpsc::Sender<StreamSnapshot>) {
        self.session.record_query();
        self.session.record_streaming_run();

        // Stage 1: Validate.
        if let Err(message) = validate_query(&request.text, &self.limits) {
            metrics::inc_error("validate", "invalid_query");
            self.session.record_failure();
            let _ = tx
                .send(failure_snapshot(
                    PipelineError::Validation(message),
                    Vec::new(),
                    None,
                ))
                .await;
            return;
        }
        metrics::inc_stage("validate");

        // Stage 2: Retrieve.
        let documents = match self.retrieve_with_fallback(&request.text).await {
            Ok(documents) => documents,
            Err(e) => {
                metrics::inc_error("retrieve", "retrieval_failure");
                self.session.record_failure();
                let _ = tx
                    .send(failure_snapshot(
                        PipelineError::Retrieval(e.0),
                        Vec::new(),
                        None,
                    ))
                    .await;
                return;
            }
        };
        metrics::inc_stage("retrieve");

        // Stage 3: Route.
        let decision = match self.router.route(
            &request.text,
            &documents,
            request.mode,
            &request.available_backends,
        ) {
            Ok(decision) => decision,
            Err(e) => {
                metrics::inc_error("route", "no_backends");
                self.session.record_failure();
                let _ = tx
                    .send(failure_snapshot(
                        PipelineError::Other(e.to_string()),
                        documents,
                        None,
                    ))
                    .await;
                return;
            }
        };
        metrics::inc_stage("route");

        // Stage 4: AssembleContext.
        let assessment = self.classifier.assess(&request.text);
        let bundle = self
            .assembler
            .assemble(assessment.tier, &documents, &request.text);
        metrics::inc_stage("assemble");

        // Stage 5: Generate, chunk by chunk.
        let (mut stream, served) = match self
            .open_stream_with_downgrade(&decision, &request.text, &bundle.text)
            .await
        {
            Ok(opened) => opened,
            Err(error) => {
                self.session.record_failure();
                let _ = tx
                    .send(failure_snapshot(error, documents, Some(decision)))
                    .await;
                return;
            }
        };

        let mut answer = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    answer.push_str(&chunk);
                    let snapshot = StreamSnapshot {
                        success: true,
                        answer: answer.clone(),
                        documents: documents.clone(),
                        routing: Some(decision.clone()),
                        error: None,
                        is_streaming: true,
                    };
                    if tx.send(snapshot).await.is_err() {
                        // Consumer dropped the receiver: the run is
                        // abandoned, nothing to roll back.
                        info!("stream consumer gone, abandoning run");
                        return;
                    }
                }
                Err(e) => {
                    metrics::inc_error("generate", "stream_failure");
                    self.session.record_failure();
                    let _ = tx
                        .send(failure_snapshot(
                            map_generate_error(e),
                            documents,
                            Some(decision),
                        ))
                        .await;
                    return;
                }
            }
        }
        metrics::inc_stage("generate");

        self.session.record_backend(
            served,
            estimate_tokens(&request.text) + estimate_tokens(&bundle.text)
                + estimate_tokens(&answer),
        );

        // Stage 6: Package. Final emission: empty incremental answer, the
        // full text was already delivered through the chunk snapshots.
        metrics::inc_stage("package");
        info!(answer_len = answer.len(), "stream completed");
        let _ = tx
            .send(StreamSnapshot {
                success: true,
                answer: String::new(),
                documents,
                routing: Some(decision),
                error: None,
                is_streaming: false,
            })
            .await;
    }

    // ── Stage helpers ──────────────────────────────────────────────────

    /// Enhanced retrieval with a single transparent fallback to the
    /// baseline path. With enhancement disabled, the baseline path is the
    /// only attempt.
    async fn retrieve_with_fallback(
        &self,
        query: &str,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if self.retrieval.enhanced {
            match self
                .retriever
                .retrieve_enhanced(query, self.retrieval.top_k)
                .await
            {
                Ok(enhanced) => {
                    tracing::debug!(
                        docs = enhanced.documents.len(),
                        provenance = enhanced.provenance.len(),
                        "enhanced retrieval succeeded"
                    );
                    return Ok(enhanced.documents);
                }
                Err(e) => {
                    warn!(error = %e, "enhanced retrieval failed, falling back to baseline");
                    metrics::inc_error("retrieve", "enhanced_failure");
                }
            }
        }
        self.retriever.retrieve(query, self.retrieval.top_k).await
    }

    /// Generate against the routed backend; on an access/entitlement error,
    /// retry exactly once against the guaranteed fast backend. Returns the
    /// answer and the backend that actually served it.
    async fn generate_with_downgrade(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
        context: &str,
    ) -> Result<(String, Backend), PipelineError> {
        match self
            .generator
            .generate(&decision.backend_id, prompt, context)
            .await
        {
            Ok(answer) => Ok((answer, decision.backend)),
            Err(GenerateError::AccessDenied(denied)) => {
                warn!(
                    backend = decision.backend.as_str(),
                    "backend not accessible, retrying on fast backend"
                );
                metrics::inc_error("generate", "access_denied");
                let fast_id = self.router.config().backend_id(Backend::Fast).to_string();
                match self.generator.generate(&fast_id, prompt, context).await {
                    Ok(answer) => Ok((answer, Backend::Fast)),
                    Err(retry_err) => Err(PipelineError::BackendUnavailable(format!(
                        "primary backend denied: {denied}; fast fallback failed: {retry_err}"
                    ))),
                }
            }
            Err(GenerateError::Failed(message)) => {
                metrics::inc_error("generate", "generation_failure");
                Err(PipelineError::Generation(message))
            }
        }
    }

    /// Streaming twin of [`generate_with_downgrade`]: the downgrade applies
    /// at stream-open time; once chunks flow, errors are terminal because
    /// the stream cannot restart.
    ///
    /// [`generate_with_downgrade`]: Self::generate_with_downgrade
    async fn open_stream_with_downgrade(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
        context: &str,
    ) -> Result<(TokenStream, Backend), PipelineError> {
        match self
            .generator
            .generate_stream(&decision.backend_id, prompt, context)
            .await
        {
            Ok(stream) => Ok((stream, decision.backend)),
            Err(GenerateError::AccessDenied(denied)) => {
                warn!(
                    backend = decision.backend.as_str(),
                    "backend not accessible, retrying stream on fast backend"
                );
                metrics::inc_error("generate", "access_denied");
                let fast_id = self.router.config().backend_id(Backend::Fast).to_string();
                match self
                    .generator
                    .generate_stream(&fast_id, prompt, context)
                    .await
                {
                    Ok(stream) => Ok((stream, Backend::Fast)),
                    Err(retry_err) => Err(PipelineError::BackendUnavailable(format!(
                        "primary backend denied: {denied}; fast fallback failed: {retry_err}"
                    ))),
                }
            }
            Err(GenerateError::Failed(message)) => {
                metrics::inc_error("generate", "generation_failure");
                Err(PipelineError::Generation(message))
            }
        }
    }
}

/// Enforce the query length contract.
fn validate_query(text: &str, limits: &LimitsConfig) -> Result<(), String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("query is empty".to_string());
    }
    let chars = trimmed.chars().count();
    if chars < limits.min_query_chars {
        return Err(format!(
            "query is too short ({chars} chars, minimum {})",
            limits.min_query_chars
        ));
    }
    if chars > limits.max_query_chars {
        return Err(format!(
            "query exceeds the maximum length ({chars} chars, cap {})",
            limits.max_query_chars
        ));
    }
    Ok(())
}

fn map_generate_error(e: GenerateError) -> PipelineError {
    match e {
        GenerateError::AccessDenied(m) => PipelineError::BackendUnavailable(m),
        GenerateError::Failed(m) => PipelineError::Generation(m),
    }
}

fn failure_snapshot(
    error: PipelineError,
    documents: Vec<RetrievedDocument>,
    routing: Option<RoutingDecision>,
) -> StreamSnapshot {
    StreamSnapshot {
        success: false,
        answer: String::new(),
        documents,
        routing,
        error: Some(error.to_string()),
        is_streaming: false,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_normalizes_whitespace_and_case() {
        assert_eq!(cache_key("What is X?"), cache_key("  what   is x?  "));
    }

    #[test]
    fn test_cache_key_distinguishes_different_queries() {
        assert_ne!(cache_key("what is x"), cache_key("what is y"));
    }

    #[test]
    fn test_cache_key_has_stable_prefix() {
        assert!(cache_key("anything").starts_with("query:"));
    }

    #[test]
    fn test_validate_rejects_empty_query() {
        let limits = LimitsConfig::default();
        assert!(validate_query("", &limits).is_err());
        assert!(validate_query("   \n ", &limits).is_err());
    }

    #[test]
    fn test_validate_rejects_too_short_query() {
        let limits = LimitsConfig::default();
        let err = validate_query("ab", &limits).err();
        assert!(err.is_some_and(|m| m.contains("too short")));
    }

    #[test]
    fn test_validate_rejects_over_cap_query() {
        let limits = LimitsConfig::default();
        let huge = "x".repeat(limits.max_query_chars + 1);
        let err = validate_query(&huge, &limits).err();
        assert!(err.is_some_and(|m| m.contains("maximum length")));
    }

    #[test]
    fn test_validate_accepts_normal_query() {
        let limits = LimitsConfig::default();
        assert!(validate_query("What is a report suite?", &limits).is_ok());
    }

    #[test]
    fn test_request_builder_defaults() {
        let request = QueryRequest::new("hello");
        assert_eq!(request.mode, OperatingMode::Tiered);
        assert_eq!(request.available_backends.len(), 3);
    }

    #[test]
    fn test_result_accessors() {
        let failure = PipelineResult::Err(PipelineFailure {
            error: PipelineError::Validation("empty".to_string()),
            documents: vec![RetrievedDocument::new("d", 0.5, "kb://x")],
            routing: None,
        });
        assert!(!failure.is_success());
        assert!(failure.answer().is_none());
        assert_eq!(failure.documents().len(), 1);
        assert!(matches!(
            failure.error(),
            Some(PipelineError::Validation(_))
        ));
    }
}

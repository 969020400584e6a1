//! Retrieval collaborator abstraction and implementations.
//!
//! Provides the [`Retriever`] trait and two implementations:
//! - [`HttpRetriever`]: JSON client for a knowledge-store retrieve endpoint
//! - [`StaticRetriever`]: in-memory fixture for tests and demos
//!
//! The pipeline consumes retrieval through this trait only. The "enhanced"
//! variant may return per-result provenance, which the pipeline uses purely
//! for diagnostics, never for routing logic.

use crate::{PipelineError, RetrievedDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Retrieval failure: malformed input or service unavailability.
///
/// The pipeline recovers this class once (enhanced attempt falls back to the
/// baseline path); a second failure is terminal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("retrieval failed: {0}")]
pub struct RetrievalError(
    /// Human-readable cause reported by the retrieval service or transport.
    pub String,
);

/// Result of an enhanced retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedRetrieval {
    /// Ranked documents, best first.
    pub documents: Vec<RetrievedDocument>,
    /// Per-result provenance strings. Diagnostics only.
    pub provenance: Vec<String>,
}

/// Trait for document retrieval services.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via `Arc<dyn Retriever>`.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Baseline retrieval: up to `top_k` ranked documents for `query`.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;

    /// Enhanced retrieval with per-result provenance.
    ///
    /// The default implementation delegates to [`retrieve`](Self::retrieve)
    /// and reports each document's source locator as its provenance.
    async fn retrieve_enhanced(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<EnhancedRetrieval, RetrievalError> {
        let documents = self.retrieve(query, top_k).await?;
        let provenance = documents.iter().map(|d| d.source_locator.clone()).collect();
        Ok(EnhancedRetrieval {
            documents,
            provenance,
        })
    }
}

// ============================================================================
// Static Retriever (testing / demos)
// ============================================================================

/// In-memory retriever over a fixed document set.
///
/// Returns the first `top_k` of its documents for every query. Failure
/// injection switches let tests exercise the fallback path.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    documents: Vec<RetrievedDocument>,
    fail_enhanced: bool,
    fail_baseline: bool,
}

impl StaticRetriever {
    /// Create a retriever serving `documents`.
    pub fn new(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            fail_enhanced: false,
            fail_baseline: false,
        }
    }

    /// Make every enhanced call fail (the baseline path still works).
    pub fn with_failing_enhanced(mut self) -> Self {
        self.fail_enhanced = true;
        self
    }

    /// Make every call fail, enhanced and baseline alike.
    pub fn with_failing_baseline(mut self) -> Self {
        self.fail_enhanced = true;
        self.fail_baseline = true;
        self
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if self.fail_baseline {
            return Err(RetrievalError("injected baseline failure".to_string()));
        }
        Ok(self.documents.iter().take(top_k).cloned().collect())
    }

    async fn retrieve_enhanced(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<EnhancedRetrieval, RetrievalError> {
        if self.fail_enhanced {
            return Err(RetrievalError("injected enhanced failure".to_string()));
        }
        let documents = self.retrieve(query, top_k).await?;
        let provenance = documents
            .iter()
            .map(|d| format!("static:{}", d.source_locator))
            .collect();
        Ok(EnhancedRetrieval {
            documents,
            provenance,
        })
    }
}

// ============================================================================
// HTTP Retriever
// ============================================================================

/// Knowledge-store retrieve request payload.
#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    enhanced: bool,
}

/// Knowledge-store retrieve response.
#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    results: Vec<RetrieveResult>,
}

#[derive(Debug, Deserialize)]
struct RetrieveResult {
    text: String,
    score: f64,
    source: String,
    #[serde(default)]
    provenance: Option<String>,
}

/// HTTP retriever for a JSON knowledge-store endpoint.
///
/// Posts `{query, top_k}` to `{base_url}/retrieve` and maps the ranked
/// results into [`RetrievedDocument`] values.
///
/// ## Example
///
/// ```no_run
/// use query_orchestrator::HttpRetriever;
/// use std::time::Duration;
///
/// let retriever = HttpRetriever::new("http://localhost:7700")
///     .with_timeout(Duration::from_secs(10));
/// ```
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRetriever {
    /// Create a retriever for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create a retriever reading the base URL from `RETRIEVAL_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the variable is not set, so
    /// misconfiguration surfaces at construction rather than on the first
    /// query.
    pub fn from_env() -> Result<Self, PipelineError> {
        let base_url = std::env::var("RETRIEVAL_URL")
            .map_err(|_| PipelineError::Config("RETRIEVAL_URL not set".to_string()))?;
        Ok(Self::new(base_url))
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(
        &self,
        query: &str,
        top_k: usize,
        enhanced: bool,
    ) -> Result<RetrieveResponse, RetrievalError> {
        let request = RetrieveRequest {
            query,
            top_k,
            enhanced,
        };

        let response = self
            .client
            .post(format!("{}/retrieve", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError(format!("retrieve request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError(format!(
                "retrieve endpoint error {status}: {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError(format!("failed to parse retrieve response: {e}")))
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let response = self.call(query, top_k, false).await?;
        Ok(response
            .results
            .into_iter()
            .map(|r| RetrievedDocument::new(r.text, r.score, r.source))
            .collect())
    }

    async fn retrieve_enhanced(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<EnhancedRetrieval, RetrievalError> {
        let response = self.call(query, top_k, true).await?;
        let mut documents = Vec::with_capacity(response.results.len());
        let mut provenance = Vec::with_capacity(response.results.len());
        for r in response.results {
            provenance.push(r.provenance.unwrap_or_else(|| r.source.clone()));
            documents.push(RetrievedDocument::new(r.text, r.score, r.source));
        }
        Ok(EnhancedRetrieval {
            documents,
            provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_docs() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument::new("alpha", 0.9, "kb://a"),
            RetrievedDocument::new("beta", 0.7, "kb://b"),
            RetrievedDocument::new("gamma", 0.5, "kb://c"),
        ]
    }

    #[tokio::test]
    async fn test_static_retriever_respects_top_k() {
        let r = StaticRetriever::new(sample_docs());
        let docs = r
            .retrieve("any", 2)
            .await
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: retrieve: {e}")));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "alpha");
    }

    #[tokio::test]
    async fn test_static_retriever_enhanced_carries_provenance() {
        let r = StaticRetriever::new(sample_docs());
        let enhanced = r
            .retrieve_enhanced("any", 3)
            .await
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: retrieve: {e}")));
        assert_eq!(enhanced.provenance.len(), 3);
        assert_eq!(enhanced.provenance[0], "static:kb://a");
    }

    #[tokio::test]
    async fn test_failing_enhanced_leaves_baseline_working() {
        let r = StaticRetriever::new(sample_docs()).with_failing_enhanced();
        assert!(r.retrieve_enhanced("any", 3).await.is_err());
        assert!(r.retrieve("any", 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_baseline_fails_both_paths() {
        let r = StaticRetriever::new(sample_docs()).with_failing_baseline();
        assert!(r.retrieve_enhanced("any", 3).await.is_err());
        assert!(r.retrieve("any", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_default_enhanced_uses_source_locators() {
        // A retriever that only implements the baseline path still provides
        // provenance through the trait default.
        struct Bare(Vec<RetrievedDocument>);

        #[async_trait]
        impl Retriever for Bare {
            async fn retrieve(
                &self,
                _query: &str,
                top_k: usize,
            ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
                Ok(self.0.iter().take(top_k).cloned().collect())
            }
        }

        let r = Bare(sample_docs());
        let enhanced = r
            .retrieve_enhanced("any", 2)
            .await
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: retrieve: {e}")));
        assert_eq!(enhanced.provenance, vec!["kb://a", "kb://b"]);
    }

    #[test]
    fn test_retrieval_error_display() {
        let e = RetrievalError("kb down".to_string());
        assert_eq!(e.to_string(), "retrieval failed: kb down");
    }
}

//! Generation collaborator abstraction and implementations.
//!
//! Provides the [`Generator`] trait and two implementations:
//! - [`AnthropicGenerator`]: Anthropic messages API over HTTPS
//! - [`EchoGenerator`]: testing/demo worker
//!
//! ## Environment Variables
//!
//! - `ANTHROPIC_API_KEY`: Required for [`AnthropicGenerator::from_env`]
//!
//! Failures are split into two classes: [`GenerateError::AccessDenied`]
//! (entitlement/availability, recoverable once by downgrading to the fast
//! backend) and [`GenerateError::Failed`] (everything else, terminal).

use crate::PipelineError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A finite, single-pass, non-restartable sequence of answer chunks.
pub type TokenStream = BoxStream<'static, Result<String, GenerateError>>;

/// Generation failure classes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    /// The caller is not entitled to the requested backend, or the backend
    /// is not currently available. The pipeline retries exactly once against
    /// the guaranteed fast backend.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other generation failure: malformed prompt, quota, transport.
    /// Terminal, no retry.
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Trait for generation backends.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across tasks.
/// Object-safe to allow dynamic dispatch via `Arc<dyn Generator>`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a complete answer in one call.
    async fn generate(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<String, GenerateError>;

    /// Generate an answer as an ordered chunk stream.
    ///
    /// The stream is finite and cannot be restarted; abandoning it mid-way
    /// is safe and carries no cleanup obligation.
    async fn generate_stream(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<TokenStream, GenerateError>;
}

/// Combine retrieved context and the user query into one prompt string.
pub(crate) fn compose_prompt(prompt: &str, context: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{context}\n\nQuery: {prompt}")
    }
}

/// Split `text` into word chunks that concatenate back to exactly `text`.
///
/// Used to re-chunk a fully generated answer into a simulated stream.
fn word_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for (i, word) in text.split_inclusive(char::is_whitespace).enumerate() {
        current.push_str(word);
        if (i + 1) % 4 == 0 {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ============================================================================
// Echo Generator (testing)
// ============================================================================

/// Dummy echo generator for tests and demos.
///
/// Answers with the backend id and the prompt text, so routing and prompt
/// propagation are observable in assertions. Failure injection switches let
/// tests exercise the downgrade-retry and mid-stream failure paths.
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator {
    /// Simulated inference delay per call, milliseconds.
    delay_ms: u64,
    /// Backend ids that answer with `AccessDenied`.
    denied_backends: Vec<String>,
    /// If set, the chunk stream errors after yielding this many chunks.
    fail_stream_after: Option<usize>,
}

impl EchoGenerator {
    /// Create a zero-delay echo generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a simulated per-call delay.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Deny access to `backend_id`, simulating a missing entitlement.
    pub fn with_denied_backend(mut self, backend_id: impl Into<String>) -> Self {
        self.denied_backends.push(backend_id.into());
        self
    }

    /// Make streams fail after `chunks` chunks.
    pub fn with_stream_failure_after(mut self, chunks: usize) -> Self {
        self.fail_stream_after = Some(chunks);
        self
    }

    fn answer_for(&self, backend_id: &str, prompt: &str) -> String {
        format!("[{backend_id}] {prompt}")
    }

    fn check_access(&self, backend_id: &str) -> Result<(), GenerateError> {
        if self.denied_backends.iter().any(|b| b == backend_id) {
            return Err(GenerateError::AccessDenied(format!(
                "no entitlement for backend {backend_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<String, GenerateError> {
        self.check_access(backend_id)?;
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        let _ = context;
        Ok(self.answer_for(backend_id, prompt))
    }

    async fn generate_stream(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<TokenStream, GenerateError> {
        self.check_access(backend_id)?;
        let _ = context;
        let full = self.answer_for(backend_id, prompt);
        let mut items: Vec<Result<String, GenerateError>> =
            word_chunks(&full).into_iter().map(Ok).collect();
        if let Some(after) = self.fail_stream_after {
            items.truncate(after);
            items.push(Err(GenerateError::Failed(
                "injected mid-stream failure".to_string(),
            )));
        }
        Ok(stream::iter(items).boxed())
    }
}

// ============================================================================
// Anthropic Generator
// ============================================================================

/// Anthropic messages API request payload.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

/// Anthropic messages API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

/// Anthropic messages API generator.
///
/// The `backend_id` passed by the pipeline is the model identifier. HTTP 401
/// and 403 responses map to [`GenerateError::AccessDenied`] so the pipeline
/// can apply its fast-backend downgrade; everything else is
/// [`GenerateError::Failed`].
///
/// The streaming call generates the full answer and re-chunks it word-wise;
/// the chunk sequence concatenates back to exactly the batch answer.
///
/// ## Example
///
/// ```no_run
/// use query_orchestrator::AnthropicGenerator;
///
/// # fn example() -> Result<(), query_orchestrator::PipelineError> {
/// let generator = AnthropicGenerator::from_env()?
///     .with_max_tokens(1000)
///     .with_temperature(0.7);
/// # Ok(()) }
/// ```
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl AnthropicGenerator {
    /// Create a generator with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create a generator reading the key from `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the variable is not set, so
    /// misconfiguration surfaces at construction rather than on the first
    /// query.
    pub fn from_env() -> Result<Self, PipelineError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| PipelineError::Config("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set sampling temperature (0.0 to 1.0).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<String, GenerateError> {
        let request = AnthropicRequest {
            model: backend_id.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: compose_prompt(prompt, context),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("API error {status}: {error_text}");
            return if status.as_u16() == 401
                || status.as_u16() == 403
                || error_text.to_lowercase().contains("access")
            {
                Err(GenerateError::AccessDenied(message))
            } else {
                Err(GenerateError::Failed(message))
            };
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Failed(format!("failed to parse response: {e}")))?;

        match api_response.content.first() {
            Some(block) => Ok(block.text.clone()),
            None => Err(GenerateError::Failed(
                "empty content in response".to_string(),
            )),
        }
    }

    async fn generate_stream(
        &self,
        backend_id: &str,
        prompt: &str,
        context: &str,
    ) -> Result<TokenStream, GenerateError> {
        // Simulated streaming: generate the full answer, then re-chunk it.
        let full = self.generate(backend_id, prompt, context).await?;
        let items: Vec<Result<String, GenerateError>> =
            word_chunks(&full).into_iter().map(Ok).collect();
        Ok(stream::iter(items).boxed())
    }
}

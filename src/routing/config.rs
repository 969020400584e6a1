//! Routing configuration types.
//!
//! Provides [`RoutingConfig`] for tuning the operating mode, the retrieval
//! relevance threshold, backend model identifiers, and per-backend cost
//! rates. All fields have sensible defaults and are (de)serialisable via
//! serde for TOML/JSON config files.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::router::{Backend, OperatingMode};

// ── Default value functions ────────────────────────────────────────────

/// Default operating mode: tiered routing.
fn default_mode() -> OperatingMode {
    OperatingMode::Tiered
}

/// Default retrieval-relevance floor below which routing prefers the most
/// capable backend.
fn default_low_relevance_threshold() -> f64 {
    0.3
}

/// Default fast backend model identifier.
fn default_fast_id() -> String {
    "claude-3-haiku-20240307".to_string()
}

/// Default balanced backend model identifier.
fn default_balanced_id() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

/// Default most-capable backend model identifier.
fn default_most_capable_id() -> String {
    "claude-3-opus-20240229".to_string()
}

/// Default fast-backend cost per 1 000 tokens (USD).
fn default_fast_cost_per_1k() -> f64 {
    0.00025
}

/// Default balanced-backend cost per 1 000 tokens (USD).
fn default_balanced_cost_per_1k() -> f64 {
    0.003
}

/// Default most-capable-backend cost per 1 000 tokens (USD).
fn default_most_capable_cost_per_1k() -> f64 {
    0.015
}

// ── RoutingConfig ──────────────────────────────────────────────────────

/// Configuration for the model routing layer.
///
/// Controls how retrieval relevance and query complexity map to a
/// [`RoutingDecision`](super::RoutingDecision), and what each backend costs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RoutingConfig {
    /// Default operating mode for callers that do not specify one.
    #[serde(default = "default_mode")]
    pub mode: OperatingMode,

    /// Mean-relevance floor. Below this, thin retrieval means the routed
    /// backend must rely on parametric knowledge, so the most capable
    /// backend is preferred. Range: `0.0..=1.0`. Default: `0.3`.
    #[serde(default = "default_low_relevance_threshold")]
    pub low_relevance_threshold: f64,

    /// Backend model identifier table.
    #[serde(default)]
    pub backends: BackendIds,

    /// Per-backend cost rates for session accounting.
    #[serde(default)]
    pub costs: BackendCosts,
}

impl RoutingConfig {
    /// Look up the model identifier for `backend`.
    pub fn backend_id(&self, backend: Backend) -> &str {
        match backend {
            Backend::Fast => &self.backends.fast,
            Backend::Balanced => &self.backends.balanced,
            Backend::MostCapable => &self.backends.most_capable,
        }
    }

    /// Look up the cost per 1 000 tokens for `backend`.
    pub fn cost_per_1k(&self, backend: Backend) -> f64 {
        match backend {
            Backend::Fast => self.costs.fast_per_1k,
            Backend::Balanced => self.costs.balanced_per_1k,
            Backend::MostCapable => self.costs.most_capable_per_1k,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            low_relevance_threshold: default_low_relevance_threshold(),
            backends: BackendIds::default(),
            costs: BackendCosts::default(),
        }
    }
}

/// Model identifier for each abstract backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BackendIds {
    /// Identifier sent to the generation service for the fast backend.
    #[serde(default = "default_fast_id")]
    pub fast: String,
    /// Identifier for the balanced backend.
    #[serde(default = "default_balanced_id")]
    pub balanced: String,
    /// Identifier for the most capable backend.
    #[serde(default = "default_most_capable_id")]
    pub most_capable: String,
}

impl Default for BackendIds {
    fn default() -> Self {
        Self {
            fast: default_fast_id(),
            balanced: default_balanced_id(),
            most_capable: default_most_capable_id(),
        }
    }
}

/// Estimated USD cost per 1 000 tokens for each backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BackendCosts {
    /// Fast backend rate.
    #[serde(default = "default_fast_cost_per_1k")]
    pub fast_per_1k: f64,
    /// Balanced backend rate.
    #[serde(default = "default_balanced_cost_per_1k")]
    pub balanced_per_1k: f64,
    /// Most capable backend rate.
    #[serde(default = "default_most_capable_cost_per_1k")]
    pub most_capable_per_1k: f64,
}

impl Default for BackendCosts {
    fn default() -> Self {
        Self {
            fast_per_1k: default_fast_cost_per_1k(),
            balanced_per_1k: default_balanced_cost_per_1k(),
            most_capable_per_1k: default_most_capable_cost_per_1k(),
        }
    }
}

/// Validate a [`RoutingConfig`], returning a list of human-readable errors.
///
/// Returns an empty `Vec` on success, or one error string per violated
/// constraint (no short-circuit).
pub fn validate(config: &RoutingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.low_relevance_threshold < 0.0 || config.low_relevance_threshold > 1.0 {
        errors.push(format!(
            "low_relevance_threshold must be in [0.0, 1.0], got {}",
            config.low_relevance_threshold
        ));
    }

    for (field, id) in [
        ("backends.fast", &config.backends.fast),
        ("backends.balanced", &config.backends.balanced),
        ("backends.most_capable", &config.backends.most_capable),
    ] {
        if id.trim().is_empty() {
            errors.push(format!("{field} must not be empty"));
        }
    }

    for (field, rate) in [
        ("costs.fast_per_1k", config.costs.fast_per_1k),
        ("costs.balanced_per_1k", config.costs.balanced_per_1k),
        ("costs.most_capable_per_1k", config.costs.most_capable_per_1k),
    ] {
        if rate < 0.0 {
            errors.push(format!("{field} must be >= 0, got {rate}"));
        }
    }

    errors
}

// ── Tests ──────────────────────────────────────────────────────────────

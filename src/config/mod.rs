//! # Declarative orchestrator configuration
//!
//! ## Responsibility
//! Parse and validate TOML configuration for the pipeline: query limits,
//! cache sizing, retrieval settings, routing policy, and observability.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same [`AppConfig`]
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Type-safe: invalid field combinations are caught at parse time via serde
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building the runtime pipeline from config (that belongs to `pipeline`)
//! - Routing policy semantics (that belongs to `routing`)

pub mod loader;
pub mod validation;

use crate::routing::RoutingConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ──────────────────────────────────────────────

/// Default hard cap on query length, in characters.
fn default_max_query_chars() -> usize {
    20_000
}

/// Default minimum query length, in characters.
fn default_min_query_chars() -> usize {
    3
}

/// Default result-cache capacity, in entries.
fn default_cache_capacity() -> usize {
    500
}

/// Default result-cache TTL: 600 seconds (10 minutes).
fn default_cache_ttl_s() -> u64 {
    600
}

/// Default number of documents requested from retrieval.
fn default_top_k() -> usize {
    3
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for an orchestrator instance.
///
/// Deserialized from a TOML file and validated before use. Every field has
/// either a required value or a documented default.
///
/// # Example
///
/// ```toml
/// [orchestrator]
/// name = "production"
/// version = "1.0"
///
/// [routing]
/// mode = "tiered"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AppConfig {
    /// Instance identity and version metadata.
    pub orchestrator: OrchestratorSection,
    /// Query length limits enforced by the validate stage.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Batch result cache sizing.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retrieval collaborator settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Routing policy settings.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Logging and metrics settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorSection {
                name: "query-orchestrator".to_string(),
                version: "1.0".to_string(),
                description: None,
            },
            limits: LimitsConfig::default(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            routing: RoutingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Instance identity and version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct OrchestratorSection {
    /// Human-readable instance name (e.g., "production", "staging").
    pub name: String,
    /// Semantic version of this configuration (e.g., "1.0").
    pub version: String,
    /// Optional description for documentation purposes.
    pub description: Option<String>,
}

/// Query length limits.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LimitsConfig {
    /// Hard cap on query length, in characters. Longer queries are rejected
    /// by the validate stage; the pipeline never trusts the caller on this.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Minimum query length, in characters (after trimming).
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_query_chars: default_max_query_chars(),
            min_query_chars: default_min_query_chars(),
        }
    }
}

/// Batch result cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of cached results. Zero disables caching (every `set`
    /// is immediately evicted).
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Per-entry time to live, in seconds.
    #[serde(default = "default_cache_ttl_s")]
    pub ttl_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_s: default_cache_ttl_s(),
        }
    }
}

/// Retrieval collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RetrievalConfig {
    /// Number of documents requested per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Whether to try the enhanced retrieval path first. When it fails, the
    /// pipeline transparently falls back to baseline retrieval once.
    #[serde(default = "default_true")]
    pub enhanced: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            enhanced: default_true(),
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default = "LogFormat::default")]
    pub log_format: LogFormat,
    /// Whether Prometheus metrics are initialised at startup.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, colorized log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

/// Export the JSON Schema for `AppConfig`.
///
/// This enables IDE autocomplete when editing TOML config files.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails (should not
/// happen with well-formed derive macros).
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(AppConfig);
    serde_json::to_string_pretty(&schema)
}

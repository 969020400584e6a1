//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`AppConfig`] that cannot be
//! expressed through the type system alone (range checks, cross-field
//! invariants).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::AppConfig;
use crate::routing;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "limits.max_query_chars").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on an [`AppConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Identity ─────────────────────────────────────────────────────
    if config.orchestrator.name.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "orchestrator.name".into(),
            value: "\"\"".into(),
            reason: "must not be empty".into(),
        });
    }

    // ── Limits ───────────────────────────────────────────────────────
    if config.limits.max_query_chars == 0 {
        errors.push(ConfigError::InvalidField {
            field: "limits.max_query_chars".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    if config.limits.min_query_chars > config.limits.max_query_chars {
        errors.push(ConfigError::InvalidField {
            field: "limits.min_query_chars".into(),
            value: config.limits.min_query_chars.to_string(),
            reason: "must be \u{2264} max_query_chars".into(),
        });
    }

    // ── Retrieval ────────────────────────────────────────────────────
    if config.retrieval.top_k == 0 {
        errors.push(ConfigError::InvalidField {
            field: "retrieval.top_k".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    // ── Routing ──────────────────────────────────────────────────────
    for message in routing::config::validate(&config.routing) {
        errors.push(ConfigError::InvalidField {
            field: "routing".into(),
            value: String::new(),
            reason: message,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

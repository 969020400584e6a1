//! Model routing logic.
//!
//! The [`ModelRouter`] combines the short-circuit complexity policy of
//! [`ComplexityClassifier`](crate::classify::ComplexityClassifier) with
//! retrieval relevance and an availability downgrade chain to decide which
//! generation backend serves each query.

use crate::classify::{ComplexityClassifier, ComplexityTier};
use crate::RetrievedDocument;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::config::RoutingConfig;

/// Abstract generation backend, ordered by capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Cheapest, lowest-latency backend. Guaranteed available.
    Fast,
    /// Mid-tier backend balancing cost and quality.
    Balanced,
    /// Highest-capability, most expensive backend.
    MostCapable,
}

impl Backend {
    /// Lowercase label for logs and reasoning strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::MostCapable => "most_capable",
        }
    }

    /// Human-oriented description of the backend, for admin and
    /// observability surfaces.
    pub fn describe(&self) -> BackendInfo {
        match self {
            Self::Fast => BackendInfo {
                name: "Fast",
                cost_band: "lowest",
                use_cases: "definitions, simple how-to, quick answers",
            },
            Self::Balanced => BackendInfo {
                name: "Balanced",
                cost_band: "moderate",
                use_cases: "analysis, comparisons, detailed explanations",
            },
            Self::MostCapable => BackendInfo {
                name: "Most Capable",
                cost_band: "highest",
                use_cases: "creative tasks, open-ended questions, general knowledge",
            },
        }
    }
}

/// Static descriptive facts about a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendInfo {
    /// Display name.
    pub name: &'static str,
    /// Relative cost band.
    pub cost_band: &'static str,
    /// Typical workloads this backend suits.
    pub use_cases: &'static str,
}

/// Pipeline operating mode supplied by the hosting layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Force every query to the fast backend regardless of any other rule.
    CostSaving,
    /// Route by complexity tier and retrieval relevance.
    Tiered,
}

/// The routing decision for a single query. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// Chosen backend. Always a member of the availability set supplied at
    /// decision time.
    pub backend: Backend,
    /// Model identifier for the chosen backend, from [`RoutingConfig`].
    pub backend_id: String,
    /// Audit trail: which rule fired, and any downgrade with its cause.
    pub reasoning: String,
    /// Mean document relevance observed at decision time (0 if no documents).
    pub relevance_at_decision: f64,
    /// Complexity tier observed at decision time (routing policy).
    pub tier_at_decision: ComplexityTier,
}

/// Routing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    /// The caller supplied an empty availability set. This is a caller
    /// contract violation, distinct from a normal downgrade.
    #[error("no backends available: the caller must supply at least one backend")]
    NoBackends,
}

/// Deterministic cost/quality model router.
///
/// Pure policy: the same `(query, documents, mode, available)` input always
/// produces the same decision. Never returns a backend outside the supplied
/// availability set and never fails on a non-empty set.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    classifier: ComplexityClassifier,
    config: RoutingConfig,
}

impl ModelRouter {
    /// Create a new router with the given configuration.
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            classifier: ComplexityClassifier::new(),
            config,
        }
    }

    /// Borrow the routing configuration.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Route a query to a backend.
    ///
    /// In [`OperatingMode::CostSaving`] the availability set is treated as
    /// `{Fast}` and the decision is unconditionally [`Backend::Fast`]; this
    /// dominates every other rule. In [`OperatingMode::Tiered`] the decision
    /// follows mean retrieval relevance and the routing complexity tier,
    /// then the downgrade chain MostCapable → Balanced → Fast for
    /// unavailable preferences.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NoBackends`] if `available` is empty. This is
    /// the only error; any non-empty set yields a decision.
    pub fn route(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
        mode: OperatingMode,
        available: &[Backend],
    ) -> Result<RoutingDecision, RouterError> {
        if available.is_empty() {
            return Err(RouterError::NoBackends);
        }

        let relevance = mean_relevance(documents);
        let assessment = self.classifier.routing_tier(query);
        let tier = assessment.tier;

        if mode == OperatingMode::CostSaving {
            return Ok(self.decision(
                Backend::Fast,
                format!(
                    "cost-saving mode active - forcing fast backend \
                     (tier {}, relevance {relevance:.2})",
                    tier.as_str()
                ),
                relevance,
                tier,
            ));
        }

        let (preferred, rule) = if relevance < self.config.low_relevance_threshold {
            (
                Backend::MostCapable,
                format!("low retrieval relevance ({relevance:.2}) - relying on model knowledge"),
            )
        } else {
            match tier {
                ComplexityTier::Simple => (
                    Backend::Fast,
                    "simple query - fast backend for quick response".to_string(),
                ),
                ComplexityTier::Medium | ComplexityTier::Complex => (
                    Backend::Balanced,
                    format!(
                        "{} query - balanced backend for detailed analysis",
                        tier.as_str()
                    ),
                ),
                ComplexityTier::ExtremelyComplex => (
                    Backend::MostCapable,
                    "extremely complex query - most capable backend".to_string(),
                ),
            }
        };

        let (chosen, reasoning) = apply_downgrade_chain(preferred, available, rule);

        debug!(
            backend = chosen.as_str(),
            tier = tier.as_str(),
            relevance,
            "routing decision"
        );

        Ok(self.decision(chosen, reasoning, relevance, tier))
    }

    fn decision(
        &self,
        backend: Backend,
        reasoning: String,
        relevance: f64,
        tier: ComplexityTier,
    ) -> RoutingDecision {
        RoutingDecision {
            backend,
            backend_id: self.config.backend_id(backend).to_string(),
            reasoning,
            relevance_at_decision: relevance,
            tier_at_decision: tier,
        }
    }
}

/// Mean relevance score over the documents, 0 if there are none.
fn mean_relevance(documents: &[RetrievedDocument]) -> f64 {
    if documents.is_empty() {
        return 0.0;
    }
    documents.iter().map(|d| d.relevance_score).sum::<f64>() / documents.len() as f64
}

/// Substitute an unavailable preference along MostCapable → Balanced → Fast.
///
/// Falls back to the most capable member of the set when neither substitute
/// is present. The set must be non-empty (checked by the caller), so a
/// choice always exists.
fn apply_downgrade_chain(
    preferred: Backend,
    available: &[Backend],
    rule: String,
) -> (Backend, String) {
    if available.contains(&preferred) {
        return (preferred, rule);
    }
    if available.contains(&Backend::Balanced) {
        return (
            Backend::Balanced,
            format!("{rule} (downgraded to balanced - {} not available)", preferred.as_str()),
        );
    }
    if available.contains(&Backend::Fast) {
        return (
            Backend::Fast,
            format!("{rule} (downgraded to fast - {} not available)", preferred.as_str()),
        );
    }
    // Non-empty set without Balanced or Fast: take its most capable member.
    let last_resort = available
        .iter()
        .copied()
        .max()
        .unwrap_or(Backend::Fast);
    (
        last_resort,
        format!(
            "{rule} (substituted {} - {} not available)",
            last_resort.as_str(),
            preferred.as_str()
        ),
    )
}

// ── Tests ──────────────────────────────────────────────────────────────

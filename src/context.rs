//! Adaptive context assembly.
//!
//! Builds the size-bounded text block handed to the generation collaborator.
//! Context size is governed strictly by a static tier-keyed table:
//!
//! | Tier | max chars/doc | max docs |
//! |------|---------------|----------|
//! | Simple | 500 | 2 |
//! | Medium | 1500 | 3 |
//! | Complex / ExtremelyComplex | 3000 | 3 |
//!
//! The assembler takes the first N documents in caller-supplied order (it
//! never re-ranks), truncates each to the per-document cap with a `...`
//! marker, and joins them with index and relevance-score annotations.
//! Deterministic and side-effect-free; empty input yields an empty context,
//! not an error.

use crate::classify::ComplexityTier;
use crate::RetrievedDocument;
use std::time::Instant;
use tracing::debug;

/// Ellipsis marker appended to truncated document text.
const TRUNCATION_MARKER: &str = "...";

/// Per-tier context sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSizing {
    /// Maximum characters taken from each document.
    pub max_chars_per_doc: usize,
    /// Maximum number of documents included.
    pub max_docs: usize,
}

/// Sizing table lookup. `ExtremelyComplex` shares the `Complex` row.
pub fn sizing_for(tier: ComplexityTier) -> TierSizing {
    match tier {
        ComplexityTier::Simple => TierSizing {
            max_chars_per_doc: 500,
            max_docs: 2,
        },
        ComplexityTier::Medium => TierSizing {
            max_chars_per_doc: 1500,
            max_docs: 3,
        },
        ComplexityTier::Complex | ComplexityTier::ExtremelyComplex => TierSizing {
            max_chars_per_doc: 3000,
            max_docs: 3,
        },
    }
}

/// Sizing metadata recorded for every assembly, kept separate from the
/// (potentially large) context text so results can carry it cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextStats {
    /// Per-document character cap that was applied.
    pub chars_per_doc_used: usize,
    /// Number of documents actually included.
    pub docs_used: usize,
    /// Tier whose sizing row was applied.
    pub tier_used: ComplexityTier,
    /// Total character length of the assembled context.
    pub context_chars: usize,
    /// Wall-clock time spent assembling, in milliseconds.
    pub timing_ms: f64,
}

/// An assembled context block plus its sizing metadata.
///
/// Recomputed on every call from `(tier, documents)`; never cached
/// independently of the pipeline result that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    /// The joined, size-bounded context text.
    pub text: String,
    /// Sizing metadata for observability surfaces.
    pub stats: ContextStats,
}

/// Tier-driven context assembler.
///
/// Stateless; safe to share and clone freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    /// Create a new assembler.
    pub fn new() -> Self {
        Self
    }

    /// Assemble a context block for `tier` from `documents`.
    ///
    /// Documents are consumed in the order given. Each included document is
    /// truncated to the tier's per-document cap (counted in characters, not
    /// bytes) and annotated with its 1-based index and relevance score.
    pub fn assemble(
        &self,
        tier: ComplexityTier,
        documents: &[RetrievedDocument],
        query: &str,
    ) -> ContextBundle {
        let start = Instant::now();
        let sizing = sizing_for(tier);

        let mut parts = Vec::new();
        for (i, doc) in documents.iter().take(sizing.max_docs).enumerate() {
            if doc.text.is_empty() {
                continue;
            }
            let mut content: String = doc.text.chars().take(sizing.max_chars_per_doc).collect();
            if doc.text.chars().count() > sizing.max_chars_per_doc {
                content.push_str(TRUNCATION_MARKER);
            }
            parts.push(format!(
                "Document {} (score: {:.3}): {}",
                i + 1,
                doc.relevance_score,
                content
            ));
        }

        let docs_used = parts.len();
        let text = parts.join("\n\n");
        let timing_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            tier = tier.as_str(),
            docs_used,
            context_chars = text.chars().count(),
            query_chars = query.chars().count(),
            "context assembled"
        );

        let context_chars = text.chars().count();
        ContextBundle {
            text,
            stats: ContextStats {
                chars_per_doc_used: sizing.max_chars_per_doc,
                docs_used,
                tier_used: tier,
                context_chars,
                timing_ms,
            },
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

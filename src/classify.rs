//! Query complexity classification.
//!
//! Analyses a question string and produces a [`ComplexityAssessment`] used
//! for context sizing and model routing. Two deliberately distinct policies
//! live here:
//!
//! 1. [`ComplexityClassifier::assess`] — additive scoring over phrase and
//!    keyword tables, used to size retrieved context.
//!
//!    | Signal | Contribution |
//!    |--------|--------------|
//!    | Creative/open-ended phrase | +4 each |
//!    | Analytical phrase | +3 each |
//!    | Technical keyword | +1 each, unbounded |
//!    | Length class (short/medium/long) | +0 / +1 / +2 |
//!    | Question markers | +1 each, capped at +2 |
//!
//!    Score ≥5 → Complex, ≥2 → Medium, else Simple.
//!
//! 2. [`ComplexityClassifier::routing_tier`] — short-circuit rules used by
//!    the model router: any creative phrase wins outright (ExtremelyComplex),
//!    then analytical phrases (Complex), then word-count structure.
//!
//! The two call sites intentionally keep separate thresholds; see DESIGN.md.
//! Both policies are pure and deterministic: identical input always yields an
//! identical assessment, with no dependency on corpus size or prior calls.

use std::collections::BTreeSet;

// ── Pattern tables ─────────────────────────────────────────────────────

/// Creative / open-ended phrases. Any hit pushes hard toward the top tier.
const CREATIVE_PHRASES: &[&str] = &[
    "best",
    "recommend",
    "suggest",
    "trends",
    "future",
    "strategy",
    "design",
];

/// Analytical phrases indicating comparison, diagnosis, or optimisation work.
const ANALYTICAL_PHRASES: &[&str] = &[
    "analyze",
    "compare",
    "difference",
    "troubleshoot",
    "debug",
    "optimize",
    "implement",
];

/// Domain-technical keywords. Each hit contributes +1, unbounded.
const TECHNICAL_KEYWORDS: &[&str] = &[
    "integration",
    "configuration",
    "implementation",
    "architecture",
    "troubleshooting",
    "optimization",
    "migration",
    "security",
    "authentication",
    "authorization",
    "deployment",
    "monitoring",
    "scalability",
    "performance",
    "reliability",
    "compliance",
    "governance",
    "workflows",
    "pipelines",
    "apis",
    "endpoints",
    "middleware",
    "infrastructure",
    "networking",
    "storage",
    "database",
    "caching",
    "load balancing",
    "failover",
    "backup",
    "recovery",
];

/// Question markers; their combined bonus is capped at +2.
const QUESTION_MARKERS: &[&str] = &["?", "how", "what", "why", "when", "where", "which"];

/// Character-count boundary between short and medium queries.
const SHORT_CHARS: usize = 50;
/// Character-count boundary between medium and long queries.
const LONG_CHARS: usize = 300;

/// Word-count boundaries for the routing policy.
const ROUTING_SHORT_WORDS: usize = 5;
const ROUTING_LONG_WORDS: usize = 15;
const ROUTING_QUESTION_WORDS: usize = 8;

/// Additive-score thresholds.
const COMPLEX_SCORE: u32 = 5;
const MEDIUM_SCORE: u32 = 2;

// ── Types ──────────────────────────────────────────────────────────────

/// Complexity tier of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComplexityTier {
    /// Short factual question; minimal context suffices.
    Simple,
    /// Moderate question; balanced context.
    Medium,
    /// Analytical or multi-part question; comprehensive context.
    Complex,
    /// Creative or open-ended question; only the routing policy produces
    /// this tier, and context sizing treats it like [`Self::Complex`].
    ExtremelyComplex,
}

impl ComplexityTier {
    /// Lowercase label for logs and reasoning strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
            Self::ExtremelyComplex => "extremely_complex",
        }
    }
}

/// Character-length class of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthClass {
    /// Under 50 characters.
    Short,
    /// 50 to 300 characters.
    Medium,
    /// Over 300 characters.
    Long,
}

impl LengthClass {
    fn of(chars: usize) -> Self {
        if chars < SHORT_CHARS {
            Self::Short
        } else if chars <= LONG_CHARS {
            Self::Medium
        } else {
            Self::Long
        }
    }

    fn bonus(self) -> u32 {
        match self {
            Self::Short => 0,
            Self::Medium => 1,
            Self::Long => 2,
        }
    }
}

/// Result of classifying one query. Produced once per query; immutable.
///
/// `matched_signals` records every pattern that fired, for observability
/// surfaces and routing reasoning. The tier is a pure function of the query
/// text alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexityAssessment {
    /// Assigned complexity tier.
    pub tier: ComplexityTier,
    /// Raw score. For the additive policy this is the signal sum; for the
    /// routing policy it is the number of signals that fired.
    pub score: u32,
    /// Every matched signal, tagged with its table (`creative:`, `analytical:`,
    /// `technical:`, `question:`, `length:`, `words:`).
    pub matched_signals: BTreeSet<String>,
    /// Character-length class of the query.
    pub length_class: LengthClass,
}

// ── Classifier ─────────────────────────────────────────────────────────

/// Query complexity classifier.
///
/// Stateless and cheap to construct. All analysis is a constant number of
/// substring scans over the lowercased query; there is no corpus-size
/// dependency and no allocation beyond the lowercase copy and the recorded
/// signal names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityClassifier;

impl ComplexityClassifier {
    /// Create a new classifier.
    pub fn new() -> Self {
        Self
    }

    /// Additive-score assessment used for context sizing.
    ///
    /// Empty (or whitespace-only) input yields `Simple` with score 0.
    ///
    /// # Example
    ///
    /// ```rust
    /// use query_orchestrator::{ComplexityClassifier, ComplexityTier};
    /// let classifier = ComplexityClassifier::new();
    /// let assessment = classifier.assess("");
    /// assert_eq!(assessment.tier, ComplexityTier::Simple);
    /// assert_eq!(assessment.score, 0);
    /// ```
    pub fn assess(&self, query: &str) -> ComplexityAssessment {
        let lower = query.trim().to_lowercase();
        let chars = lower.chars().count();
        let length_class = LengthClass::of(chars);
        let mut signals = BTreeSet::new();
        let mut score = 0u32;

        if lower.is_empty() {
            return ComplexityAssessment {
                tier: ComplexityTier::Simple,
                score: 0,
                matched_signals: signals,
                length_class: LengthClass::Short,
            };
        }

        for phrase in CREATIVE_PHRASES {
            if lower.contains(phrase) {
                signals.insert(format!("creative:{phrase}"));
                score += 4;
            }
        }

        for phrase in ANALYTICAL_PHRASES {
            if lower.contains(phrase) {
                signals.insert(format!("analytical:{phrase}"));
                score += 3;
            }
        }

        for keyword in TECHNICAL_KEYWORDS {
            if lower.contains(keyword) {
                signals.insert(format!("technical:{keyword}"));
                score += 1;
            }
        }

        let length_bonus = length_class.bonus();
        if length_bonus > 0 {
            signals.insert(format!("length:{chars}"));
            score += length_bonus;
        }

        let mut question_hits = 0u32;
        for marker in QUESTION_MARKERS {
            if lower.contains(marker) {
                signals.insert(format!("question:{marker}"));
                question_hits += 1;
            }
        }
        score += question_hits.min(2);

        let tier = if score >= COMPLEX_SCORE {
            ComplexityTier::Complex
        } else if score >= MEDIUM_SCORE {
            ComplexityTier::Medium
        } else {
            ComplexityTier::Simple
        };

        ComplexityAssessment {
            tier,
            score,
            matched_signals: signals,
            length_class,
        }
    }

    /// Short-circuit assessment used by the model router.
    ///
    /// Precedence: creative phrases win outright, then analytical phrases,
    /// then word-count structure. This is a separate policy from [`assess`]
    /// and is the only producer of [`ComplexityTier::ExtremelyComplex`].
    ///
    /// [`assess`]: Self::assess
    pub fn routing_tier(&self, query: &str) -> ComplexityAssessment {
        let lower = query.trim().to_lowercase();
        let chars = lower.chars().count();
        let length_class = LengthClass::of(chars);
        let word_count = lower.split_whitespace().count();
        let mut signals = BTreeSet::new();

        for phrase in CREATIVE_PHRASES {
            if lower.contains(phrase) {
                signals.insert(format!("creative:{phrase}"));
            }
        }
        if !signals.is_empty() {
            let score = signals.len() as u32;
            return ComplexityAssessment {
                tier: ComplexityTier::ExtremelyComplex,
                score,
                matched_signals: signals,
                length_class,
            };
        }

        for phrase in ANALYTICAL_PHRASES {
            if lower.contains(phrase) {
                signals.insert(format!("analytical:{phrase}"));
            }
        }
        if !signals.is_empty() {
            let score = signals.len() as u32;
            return ComplexityAssessment {
                tier: ComplexityTier::Complex,
                score,
                matched_signals: signals,
                length_class,
            };
        }

        let tier = if word_count < ROUTING_SHORT_WORDS {
            signals.insert(format!("words:under_{ROUTING_SHORT_WORDS}"));
            ComplexityTier::Simple
        } else if word_count > ROUTING_LONG_WORDS {
            signals.insert(format!("words:over_{ROUTING_LONG_WORDS}"));
            ComplexityTier::Complex
        } else if lower.contains('?') && word_count > ROUTING_QUESTION_WORDS {
            signals.insert(format!("words:question_over_{ROUTING_QUESTION_WORDS}"));
            ComplexityTier::Complex
        } else {
            ComplexityTier::Simple
        };

        let score = signals.len() as u32;
        ComplexityAssessment {
            tier,
            score,
            matched_signals: signals,
            length_class,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ComplexityClassifier {
        ComplexityClassifier::new()
    }

    // -- additive: determinism and purity --------------------------------

    #[test]
    fn test_assess_is_deterministic() {
        let c = classifier();
        let q = "How do I troubleshoot missing data in my analytics implementation?";
        assert_eq!(c.assess(q), c.assess(q));
    }

    #[test]
    fn test_assess_empty_string_is_simple_score_zero() {
        let a = classifier().assess("");
        assert_eq!(a.tier, ComplexityTier::Simple);
        assert_eq!(a.score, 0);
        assert!(a.matched_signals.is_empty());
    }

    #[test]
    fn test_assess_whitespace_only_is_simple_score_zero() {
        let a = classifier().assess("   \n\t  ");
        assert_eq!(a.tier, ComplexityTier::Simple);
        assert_eq!(a.score, 0);
    }

    // -- additive: signal contributions ----------------------------------

    #[test]
    fn test_assess_technical_keywords_add_one_each() {
        let c = classifier();
        // "integration" and "security": +2 technical, no question markers,
        // short length. Medium tier at score 2.
        let a = c.assess("integration security");
        assert_eq!(a.score, 2);
        assert_eq!(a.tier, ComplexityTier::Medium);
        assert!(a.matched_signals.contains("technical:integration"));
        assert!(a.matched_signals.contains("technical:security"));
    }

    #[test]
    fn test_assess_question_bonus_capped_at_two() {
        let c = classifier();
        // Four marker types present; bonus still +2.
        let a = c.assess("how what why when");
        assert_eq!(a.score, 2);
    }

    #[test]
    fn test_assess_analytical_phrase_scores_three() {
        let a = classifier().assess("compare the two suites");
        assert!(a.matched_signals.contains("analytical:compare"));
        assert_eq!(a.score, 3);
        assert_eq!(a.tier, ComplexityTier::Medium);
    }

    #[test]
    fn test_assess_creative_phrase_scores_four() {
        let a = classifier().assess("growth strategy for retail");
        assert!(a.matched_signals.contains("creative:strategy"));
        assert_eq!(a.score, 4);
    }

    #[test]
    fn test_assess_long_query_gets_length_bonus() {
        let filler = "token ".repeat(60); // > 300 chars, no table hits
        let a = classifier().assess(&filler);
        assert_eq!(a.length_class, LengthClass::Long);
        assert_eq!(a.score, 2);
    }

    #[test]
    fn test_assess_medium_length_bonus_is_one() {
        // 50..=300 chars without any table hit is hard to build from real
        // words, so use neutral filler.
        let filler = "zz ".repeat(30);
        let a = classifier().assess(&filler);
        assert_eq!(a.length_class, LengthClass::Medium);
        assert_eq!(a.score, 1);
        assert_eq!(a.tier, ComplexityTier::Simple);
    }

    #[test]
    fn test_assess_combined_signals_reach_complex() {
        let c = classifier();
        let q = "How do I troubleshoot the security configuration of my integration?";
        // analytical:troubleshoot (+3) + technical hits + question markers.
        let a = c.assess(q);
        assert!(a.score >= 5, "expected >=5, got {} ({:?})", a.score, a.matched_signals);
        assert_eq!(a.tier, ComplexityTier::Complex);
    }

    #[test]
    fn test_assess_simple_factual_question_is_medium() {
        // "what" + "?" give the capped question bonus and nothing else fires.
        let a = classifier().assess("What is Adobe Analytics?");
        assert_eq!(a.score, 2);
        assert_eq!(a.tier, ComplexityTier::Medium);
    }

    // -- routing policy ---------------------------------------------------

    #[test]
    fn test_routing_creative_phrase_is_extremely_complex() {
        let a = classifier().routing_tier("Recommend a migration strategy");
        assert_eq!(a.tier, ComplexityTier::ExtremelyComplex);
        assert!(a
            .matched_signals
            .iter()
            .any(|s| s.starts_with("creative:")));
    }

    #[test]
    fn test_routing_analytical_phrase_is_complex() {
        let a = classifier().routing_tier("Compare the attribution models");
        assert_eq!(a.tier, ComplexityTier::Complex);
    }

    #[test]
    fn test_routing_short_question_is_simple() {
        // Four words, no table hits.
        let a = classifier().routing_tier("Is the report live");
        assert_eq!(a.tier, ComplexityTier::Simple);
    }

    #[test]
    fn test_routing_long_query_is_complex() {
        let q = "Tell me in detail about every single report type that exists \
                 in the product catalog today please";
        assert!(q.split_whitespace().count() > 15);
        let a = classifier().routing_tier(q);
        assert_eq!(a.tier, ComplexityTier::Complex);
    }

    #[test]
    fn test_routing_question_mark_with_nine_words_is_complex() {
        let q = "Can the report suite track offline events from kiosks?";
        assert_eq!(q.split_whitespace().count(), 9);
        let a = classifier().routing_tier(q);
        assert_eq!(a.tier, ComplexityTier::Complex);
    }

    #[test]
    fn test_routing_midlength_statement_is_simple() {
        // 5..=15 words, no "?" and no table phrases.
        let a = classifier().routing_tier("Show me the latest ingestion totals now");
        assert_eq!(a.tier, ComplexityTier::Simple);
    }

    #[test]
    fn test_routing_creative_beats_analytical() {
        let a = classifier().routing_tier("Compare and recommend the best option");
        assert_eq!(a.tier, ComplexityTier::ExtremelyComplex);
    }

    #[test]
    fn test_routing_empty_string_is_simple() {
        let a = classifier().routing_tier("");
        assert_eq!(a.tier, ComplexityTier::Simple);
    }

    // -- tier labels ------------------------------------------------------

    #[test]
    fn test_tier_labels() {
        assert_eq!(ComplexityTier::Simple.as_str(), "simple");
        assert_eq!(
            ComplexityTier::ExtremelyComplex.as_str(),
            "extremely_complex"
        );
    }
}

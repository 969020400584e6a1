//! Session metrics and cost accounting.
//!
//! [`SessionMetrics`] is an explicit handle passed into the pipeline rather
//! than ambient global state. It tracks query counts, cache effectiveness,
//! and per-backend token usage with estimated spend, and computes what an
//! all-most-capable baseline would have cost.
//!
//! Thread-safe: all counters use atomic operations for lock-free reads and
//! writes under concurrent pipeline access. Costs are stored as
//! micro-dollars (1 USD = 1 000 000 micro-dollars) to avoid floating-point
//! drift in long-running aggregations.

use crate::routing::{Backend, BackendCosts};
use std::sync::atomic::{AtomicU64, Ordering};

/// Rough token estimate: about four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Per-session pipeline counters and cost accounting.
#[derive(Debug)]
pub struct SessionMetrics {
    /// Cost-per-1K-tokens rates in micro-dollars, indexed Fast/Balanced/MostCapable.
    rates_micro: [u64; 3],

    queries: AtomicU64,
    streaming_runs: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    /// Requests per backend, indexed Fast/Balanced/MostCapable.
    requests: [AtomicU64; 3],
    /// Tokens per backend, same indexing.
    tokens: [AtomicU64; 3],
}

impl SessionMetrics {
    /// Create a metrics handle with the given cost rates.
    pub fn new(costs: &BackendCosts) -> Self {
        Self {
            rates_micro: [
                f64_to_micro(costs.fast_per_1k),
                f64_to_micro(costs.balanced_per_1k),
                f64_to_micro(costs.most_capable_per_1k),
            ],
            queries: AtomicU64::new(0),
            streaming_runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            requests: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            tokens: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    /// Record an accepted query (batch or streaming).
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a streaming run.
    pub fn record_streaming_run(&self) {
        self.streaming_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal pipeline failure.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache hit.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record tokens served by `backend`.
    pub fn record_backend(&self, backend: Backend, tokens: u64) {
        let i = index(backend);
        self.requests[i].fetch_add(1, Ordering::Relaxed);
        self.tokens[i].fetch_add(tokens, Ordering::Relaxed);
    }

    /// Snapshot all counters and computed costs.
    pub fn snapshot(&self) -> SessionSnapshot {
        let requests = [
            self.requests[0].load(Ordering::Relaxed),
            self.requests[1].load(Ordering::Relaxed),
            self.requests[2].load(Ordering::Relaxed),
        ];
        let tokens = [
            self.tokens[0].load(Ordering::Relaxed),
            self.tokens[1].load(Ordering::Relaxed),
            self.tokens[2].load(Ordering::Relaxed),
        ];

        let actual_micro: u128 = (0..3)
            .map(|i| (tokens[i] as u128 * self.rates_micro[i] as u128) / 1000)
            .sum();

        // Baseline: every token served by the most capable backend.
        let total_tokens: u64 = tokens.iter().sum();
        let baseline_micro = (total_tokens as u128 * self.rates_micro[2] as u128) / 1000;
        let savings_micro = baseline_micro.saturating_sub(actual_micro);

        SessionSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            streaming_runs: self.streaming_runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            fast_requests: requests[0],
            balanced_requests: requests[1],
            most_capable_requests: requests[2],
            fast_tokens: tokens[0],
            balanced_tokens: tokens[1],
            most_capable_tokens: tokens[2],
            actual_cost_usd: micro_to_f64(actual_micro),
            baseline_cost_usd: micro_to_f64(baseline_micro),
            savings_usd: micro_to_f64(savings_micro),
            savings_percent: if baseline_micro > 0 {
                (savings_micro as f64 / baseline_micro as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

fn index(backend: Backend) -> usize {
    match backend {
        Backend::Fast => 0,
        Backend::Balanced => 1,
        Backend::MostCapable => 2,
    }
}

fn f64_to_micro(usd: f64) -> u64 {
    (usd * 1_000_000.0).round().max(0.0) as u64
}

fn micro_to_f64(micro: u128) -> f64 {
    micro as f64 / 1_000_000.0
}

/// Point-in-time view of session counters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Total queries accepted (batch and streaming).
    pub queries: u64,
    /// Streaming runs started.
    pub streaming_runs: u64,
    /// Terminal pipeline failures.
    pub failures: u64,
    /// Batch cache hits.
    pub cache_hits: u64,
    /// Batch cache misses.
    pub cache_misses: u64,
    /// Requests served by the fast backend.
    pub fast_requests: u64,
    /// Requests served by the balanced backend.
    pub balanced_requests: u64,
    /// Requests served by the most capable backend.
    pub most_capable_requests: u64,
    /// Tokens served by the fast backend.
    pub fast_tokens: u64,
    /// Tokens served by the balanced backend.
    pub balanced_tokens: u64,
    /// Tokens served by the most capable backend.
    pub most_capable_tokens: u64,
    /// Estimated actual spend, USD.
    pub actual_cost_usd: f64,
    /// What the same tokens would have cost on the most capable backend.
    pub baseline_cost_usd: f64,
    /// Estimated savings versus the baseline, USD.
    pub savings_usd: f64,
    /// Savings as a percentage of the baseline.
    pub savings_percent: f64,
}

// ── Tests ──────────────────────────────────────────────────────────────

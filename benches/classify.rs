//! Classifier benchmarks — the hottest pure-CPU path in the pipeline.
//!
//! Both policies are a constant number of substring scans over the query;
//! these benches catch accidental regressions to per-call allocation or
//! table growth.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use query_orchestrator::ComplexityClassifier;

const SHORT_QUERY: &str = "What is a report suite?";
const ANALYTICAL_QUERY: &str =
    "Compare last-touch and algorithmic attribution models and explain the trade-offs";
const LONG_QUERY: &str = "How do I troubleshoot the security configuration of my analytics \
integration when the deployment pipeline keeps failing authentication against the monitoring \
endpoints, and what are the governance implications for the data retention workflows across \
storage and database layers in a multi-region infrastructure?";

fn bench_assess(c: &mut Criterion) {
    let classifier = ComplexityClassifier::new();

    c.bench_function("assess_short", |b| {
        b.iter(|| classifier.assess(black_box(SHORT_QUERY)))
    });
    c.bench_function("assess_analytical", |b| {
        b.iter(|| classifier.assess(black_box(ANALYTICAL_QUERY)))
    });
    c.bench_function("assess_long", |b| {
        b.iter(|| classifier.assess(black_box(LONG_QUERY)))
    });
}

fn bench_routing_tier(c: &mut Criterion) {
    let classifier = ComplexityClassifier::new();

    c.bench_function("routing_tier_short", |b| {
        b.iter(|| classifier.routing_tier(black_box(SHORT_QUERY)))
    });
    c.bench_function("routing_tier_long", |b| {
        b.iter(|| classifier.routing_tier(black_box(LONG_QUERY)))
    });
}

criterion_group!(benches, bench_assess, bench_routing_tier);
criterion_main!(benches);

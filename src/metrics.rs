//! Prometheus metrics for the query pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup **before** running any
//! queries. The helper functions (`inc_stage`, `record_stage_latency`, …)
//! are no-ops if `init_metrics` was never called, so the pipeline is always
//! safe to run — observability simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `pipeline_requests_total` | Counter | `stage` |
//! | `pipeline_errors_total` | Counter | `stage`, `err_type` |
//! | `pipeline_stage_duration_seconds` | Histogram | `stage` |
//! | `pipeline_cache_events_total` | Counter | `event` |

use crate::PipelineError;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

/// All Prometheus metrics for the pipeline, bundled together so they can be
/// stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Total requests processed per stage.
    pub requests_total: CounterVec,
    /// Errors by stage and error type.
    pub errors_total: CounterVec,
    /// Stage processing latency histogram.
    pub stage_duration: HistogramVec,
    /// Cache events (`hit`, `miss`, `store`).
    pub cache_events: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialise all Prometheus metrics and register them with a private
/// registry.
///
/// Must be called once at process startup. Calling it a second time is a
/// no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`PipelineError::Other`] if metric construction or registry
/// registration fails (e.g., duplicate descriptor names).
pub fn init_metrics() -> Result<(), PipelineError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = CounterVec::new(
        Opts::new("pipeline_requests_total", "Total requests per stage"),
        &["stage"],
    )
    .map_err(|e| PipelineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(requests_total.clone()))
        .map_err(|e| PipelineError::Other(format!("metrics registration failed: {e}")))?;

    let errors_total = CounterVec::new(
        Opts::new("pipeline_errors_total", "Errors by stage and type"),
        &["stage", "err_type"],
    )
    .map_err(|e| PipelineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(errors_total.clone()))
        .map_err(|e| PipelineError::Other(format!("metrics registration failed: {e}")))?;

    let stage_duration = HistogramVec::new(
        HistogramOpts::new(
            "pipeline_stage_duration_seconds",
            "Processing duration per stage",
        ),
        &["stage"],
    )
    .map_err(|e| PipelineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(stage_duration.clone()))
        .map_err(|e| PipelineError::Other(format!("metrics registration failed: {e}")))?;

    let cache_events = CounterVec::new(
        Opts::new("pipeline_cache_events_total", "Cache events by kind"),
        &["event"],
    )
    .map_err(|e| PipelineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(cache_events.clone()))
        .map_err(|e| PipelineError::Other(format!("metrics registration failed: {e}")))?;

    let _ = METRICS.set(Metrics {
        registry,
        requests_total,
        errors_total,
        stage_duration,
        cache_events,
    });

    Ok(())
}

/// Increment the per-stage request counter. No-op before [`init_metrics`].
pub fn inc_stage(stage: &str) {
    if let Some(m) = METRICS.get() {
        m.requests_total.with_label_values(&[stage]).inc();
    }
}

/// Increment the per-stage error counter. No-op before [`init_metrics`].
pub fn inc_error(stage: &str, err_type: &str) {
    if let Some(m) = METRICS.get() {
        m.errors_total.with_label_values(&[stage, err_type]).inc();
    }
}

/// Record a stage latency observation. No-op before [`init_metrics`].
pub fn record_stage_latency(stage: &str, duration: Duration) {
    if let Some(m) = METRICS.get() {
        m.stage_duration
            .with_label_values(&[stage])
            .observe(duration.as_secs_f64());
    }
}

/// Record a cache event (`hit`, `miss`, `store`). No-op before
/// [`init_metrics`].
pub fn inc_cache_event(event: &str) {
    if let Some(m) = METRICS.get() {
        m.cache_events.with_label_values(&[event]).inc();
    }
}

/// Render all metrics in the Prometheus text exposition format.
///
/// Returns an empty string before [`init_metrics`].
///
/// # Errors
///
/// Returns [`PipelineError::Other`] if encoding fails.
pub fn render_metrics() -> Result<String, PipelineError> {
    let Some(m) = METRICS.get() else {
        return Ok(String::new());
    };

    let families = m.registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| PipelineError::Other(format!("metrics encoding failed: {e}")))?;
    String::from_utf8(buffer)
        .map_err(|e| PipelineError::Other(format!("metrics encoding failed: {e}")))
}

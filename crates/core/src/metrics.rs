//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Task lifecycle (submissions, completions, failures, durations)
//! - Admission control (rejections by reason)
//! - Pipeline stages (durations per composition mode)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Task Lifecycle Metrics
// =============================================================================

/// Tasks submitted by kind.
pub static TASKS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mixdown_tasks_submitted_total", "Total tasks submitted"),
        &["kind"],
    )
    .unwrap()
});

/// Tasks completed by kind.
pub static TASKS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mixdown_tasks_completed_total",
            "Total tasks completed successfully",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Tasks failed by kind and failure reason.
pub static TASKS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mixdown_tasks_failed_total", "Total tasks failed"),
        &["kind", "reason"],
    )
    .unwrap()
});

/// End-to-end task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mixdown_task_duration_seconds",
            "End-to-end task duration from admission to terminal state",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["kind"],
    )
    .unwrap()
});

/// Tasks currently active (queued or running).
pub static TASKS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mixdown_tasks_active",
        "Tasks currently queued or running",
    )
    .unwrap()
});

// =============================================================================
// Admission Metrics
// =============================================================================

/// Admission rejections by reason.
pub static ADMISSION_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mixdown_admission_rejections_total",
            "Submissions rejected by admission control",
        ),
        &["reason"], // "memory", "disk", "concurrency", "validation"
    )
    .unwrap()
});

// =============================================================================
// Pipeline Stage Metrics
// =============================================================================

/// Stage execution duration in seconds by composition mode.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mixdown_stage_duration_seconds",
            "Duration of individual pipeline stages",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0]),
        &["stage"],
    )
    .unwrap()
});

/// Registers all core metrics on a registry. Safe to call once at startup.
pub fn register_core_metrics(registry: &prometheus::Registry) {
    let _ = registry.register(Box::new(TASKS_SUBMITTED.clone()));
    let _ = registry.register(Box::new(TASKS_COMPLETED.clone()));
    let _ = registry.register(Box::new(TASKS_FAILED.clone()));
    let _ = registry.register(Box::new(TASK_DURATION.clone()));
    let _ = registry.register(Box::new(TASKS_ACTIVE.clone()));
    let _ = registry.register(Box::new(ADMISSION_REJECTIONS.clone()));
    let _ = registry.register(Box::new(STAGE_DURATION.clone()));
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Upwatch operator.
//!
//! This module provides metrics collection with the namespace prefix `upwatch_`.
//!
//! # Metrics Categories
//!
//! - **Notification Metrics** - Track watch notifications by kind, including malformed payloads
//! - **Reconciliation Metrics** - Track reconciliation outcomes and duration
//! - **Monitor Lifecycle Metrics** - Track monitors created and deleted, and the cache size
//! - **Error Metrics** - Track failed backend calls by operation
//!
//! # Example
//!
//! ```rust,no_run
//! use upwatch::metrics::{gather_metrics, record_reconciliation_success};
//!
//! record_reconciliation_success(std::time::Duration::from_millis(20));
//! let text = gather_metrics().unwrap_or_default();
//! ```

use crate::constants::METRICS_NAMESPACE;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Notification Metrics
// ============================================================================

/// Total number of notifications received
///
/// Labels:
/// - `kind`: `added`, `updated`, `deleted` or `malformed`
pub static NOTIFICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_notifications_total"),
        "Total number of resource notifications by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by status
///
/// Labels:
/// - `status`: `success` or `error` (at least one hostname failed)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `status`: `success` or `error`
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Monitor Lifecycle Metrics
// ============================================================================

/// Total number of monitors created
pub static MONITORS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_monitors_created_total"),
        "Total number of monitors created",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of monitors deleted
pub static MONITORS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_monitors_deleted_total"),
        "Total number of monitors deleted",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of monitors currently held in the registry cache
pub static MONITORS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_monitors_active"),
        "Number of monitors currently held in the registry cache",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of failed backend calls
///
/// Labels:
/// - `operation`: Backend operation (`list_monitors`, `list_contacts`, `create_monitor`, `delete_monitor`)
pub static BACKEND_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_backend_errors_total"),
        "Total number of failed uptime backend calls by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a received notification
///
/// # Arguments
/// * `kind` - `added`, `updated`, `deleted` or `malformed`
pub fn record_notification(kind: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a reconciliation in which every hostname succeeded
///
/// # Arguments
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["success"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["success"])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation in which at least one hostname failed
///
/// # Arguments
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_error(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["error"])
        .observe(duration.as_secs_f64());
}

/// Record a monitor creation
pub fn record_monitor_created() {
    MONITORS_CREATED_TOTAL.inc();
}

/// Record a monitor deletion
pub fn record_monitor_deleted() {
    MONITORS_DELETED_TOTAL.inc();
}

/// Publish the registry cache size
#[allow(clippy::cast_precision_loss)]
pub fn set_active_monitors(count: usize) {
    MONITORS_ACTIVE.set(count as f64);
}

/// Record a failed backend call
///
/// # Arguments
/// * `operation` - Backend operation that failed
pub fn record_backend_error(operation: &str) {
    BACKEND_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

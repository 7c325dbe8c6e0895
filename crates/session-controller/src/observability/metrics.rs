//! Metrics definitions for the Session Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sc_` prefix for Session Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `phase`: 7 values (timeline phases)
//! - `operation`: provider (2) and flag store (4) operations
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Provider latency buckets - external HTTP call
        .set_buckets_for_metric(
            Matcher::Prefix("sc_provider".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set provider latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session & Scheduler Metrics (Gauges)
// ============================================================================

/// Set the number of registered sessions.
///
/// Metric: `sc_sessions_active`
pub fn set_sessions_active(count: usize) {
    // usize to f64 conversion is safe for realistic session counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_sessions_active").set(count as f64);
}

/// A scheduler task started.
///
/// Metric: `sc_schedulers_active`
pub fn scheduler_started() {
    gauge!("sc_schedulers_active").increment(1.0);
}

/// A scheduler task exited (completed or cancelled).
///
/// Metric: `sc_schedulers_active`
pub fn scheduler_stopped() {
    gauge!("sc_schedulers_active").decrement(1.0);
}

// ============================================================================
// Phase Metrics (Counters)
// ============================================================================

/// Record a phase firing.
///
/// Metric: `sc_phase_fired_total`
/// Labels: `phase`
pub fn record_phase_fired(phase: &'static str) {
    counter!("sc_phase_fired_total", "phase" => phase).increment(1);
}

/// Record one failed per-connection delivery.
///
/// Metric: `sc_broadcast_failures_total`
/// Labels: `phase`
pub fn record_broadcast_failure(phase: &str) {
    counter!("sc_broadcast_failures_total", "phase" => phase.to_string()).increment(1);
}

// ============================================================================
// External Collaborators
// ============================================================================

/// Record a media provider request.
///
/// Metrics: `sc_provider_requests_total`, `sc_provider_latency_seconds`
/// Labels: `operation`, `status`
pub fn record_provider_request(operation: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    counter!(
        "sc_provider_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);

    histogram!("sc_provider_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a flag store failure.
///
/// Metric: `sc_flag_store_errors_total`
/// Labels: `operation`
pub fn record_flag_store_error(operation: &'static str) {
    counter!("sc_flag_store_errors_total", "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run against the global no-op recorder; they only check that
    // recording never panics.

    #[test]
    fn test_set_sessions_active() {
        set_sessions_active(0);
        set_sessions_active(6);
        set_sessions_active(10_000);
    }

    #[test]
    fn test_scheduler_gauge() {
        scheduler_started();
        scheduler_stopped();
    }

    #[test]
    fn test_record_phase_metrics() {
        for phase in ["introduce", "keyword", "finish"] {
            record_phase_fired(phase);
            record_broadcast_failure(phase);
        }
    }

    #[test]
    fn test_record_provider_request() {
        record_provider_request("create_session", true, Duration::from_millis(12));
        record_provider_request("mint_token", false, Duration::from_secs(10));
    }

    #[test]
    fn test_record_flag_store_error() {
        record_flag_store_error("get");
        record_flag_store_error("try_set");
    }
}

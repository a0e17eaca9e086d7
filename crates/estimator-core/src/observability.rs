//! Prometheus metrics for the estimation service

use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;

/// Histogram buckets for request latencies (seconds). Inference and
/// estimation are sub-millisecond in the common case.
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    analogous_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    analogous_requests_total: IntCounter,
    analogous_fallback_total: IntCounter,
    model_replacements_total: IntCounter,
    audit_write_errors_total: IntCounter,
    model_loaded: IntGauge,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "estimation_prediction_latency_seconds",
                "Time spent classifying a prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            analogous_latency_seconds: register_histogram!(
                "estimation_analogous_latency_seconds",
                "Time spent computing an analogous cost estimate",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analogous_latency_seconds"),

            predictions_total: register_int_counter!(
                "estimation_predictions_total",
                "Total prediction requests served"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "estimation_prediction_errors_total",
                "Total prediction requests that failed"
            )
            .expect("Failed to register prediction_errors_total"),

            analogous_requests_total: register_int_counter!(
                "estimation_analogous_requests_total",
                "Total analogous cost requests served"
            )
            .expect("Failed to register analogous_requests_total"),

            analogous_fallback_total: register_int_counter!(
                "estimation_analogous_fallback_total",
                "Analogous requests answered with the fallback constant"
            )
            .expect("Failed to register analogous_fallback_total"),

            model_replacements_total: register_int_counter!(
                "estimation_model_replacements_total",
                "Successful model artifact replacements"
            )
            .expect("Failed to register model_replacements_total"),

            audit_write_errors_total: register_int_counter!(
                "estimation_audit_write_errors_total",
                "Audit log writes that failed and were swallowed"
            )
            .expect("Failed to register audit_write_errors_total"),

            model_loaded: register_int_gauge!(
                "estimation_model_loaded",
                "1 when a classifier artifact is active, 0 while degraded"
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Lightweight handle to the global metrics instance; clones share the
/// same underlying registry entries.
#[derive(Clone, Default)]
pub struct EstimatorMetrics {
    _private: (),
}

impl EstimatorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EstimatorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_analogous_latency(&self, duration_secs: f64) {
        self.inner().analogous_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    pub fn inc_analogous(&self, fallback_used: bool) {
        self.inner().analogous_requests_total.inc();
        if fallback_used {
            self.inner().analogous_fallback_total.inc();
        }
    }

    pub fn inc_model_replacements(&self) {
        self.inner().model_replacements_total.inc();
    }

    pub fn inc_audit_errors(&self) {
        self.inner().audit_write_errors_total.inc();
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.inner().model_loaded.set(if loaded { 1 } else { 0 });
    }
}

//! Observability for the dashboard backend
//!
//! Prometheus metrics for training and inference, and structured event logs
//! for every pipeline transition.

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Buckets for request-path latency (seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Buckets for training runs (seconds)
const TRAINING_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

static GLOBAL_METRICS: OnceLock<DashboardMetricsInner> = OnceLock::new();

struct DashboardMetricsInner {
    training_duration_seconds: Histogram,
    optimize_latency_seconds: Histogram,
    detect_latency_seconds: Histogram,
    trainings: IntCounter,
    trainings_skipped: IntCounter,
    optimize_errors: IntCounter,
    idle_resources_flagged: IntCounter,
    assignments_produced: IntCounter,
    model_state: IntGauge,
    artifact_generation_info: GaugeVec,
}

impl DashboardMetricsInner {
    fn new() -> Self {
        Self {
            training_duration_seconds: register_histogram!(
                "cloud_dashboard_training_duration_seconds",
                "Wall time of scaler and clustering training runs",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            optimize_latency_seconds: register_histogram!(
                "cloud_dashboard_optimize_latency_seconds",
                "Time spent assigning resources to clusters",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register optimize_latency_seconds"),

            detect_latency_seconds: register_histogram!(
                "cloud_dashboard_detect_latency_seconds",
                "Time spent scoring a batch for idle resources",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detect_latency_seconds"),

            trainings: register_int_counter!(
                "cloud_dashboard_trainings_total",
                "Completed training runs"
            )
            .expect("Failed to register trainings_total"),

            trainings_skipped: register_int_counter!(
                "cloud_dashboard_trainings_skipped_total",
                "Training requests skipped for lack of data"
            )
            .expect("Failed to register trainings_skipped_total"),

            optimize_errors: register_int_counter!(
                "cloud_dashboard_optimize_errors_total",
                "Optimizer requests that failed"
            )
            .expect("Failed to register optimize_errors_total"),

            idle_resources_flagged: register_int_counter!(
                "cloud_dashboard_idle_resources_flagged_total",
                "Resources labelled idle by the detector"
            )
            .expect("Failed to register idle_resources_flagged_total"),

            assignments_produced: register_int_counter!(
                "cloud_dashboard_assignments_total",
                "Cluster assignments returned by the optimizer"
            )
            .expect("Failed to register assignments_total"),

            model_state: register_int_gauge!(
                "cloud_dashboard_model_state",
                "Model lifecycle state (0 untrained, 1 training, 2 ready)"
            )
            .expect("Failed to register model_state"),

            artifact_generation_info: register_gauge_vec!(
                "cloud_dashboard_artifact_generation_info",
                "Currently active artifact generation",
                &["generation"]
            )
            .expect("Failed to register artifact_generation_info"),
        }
    }
}

/// Handle to the process-wide metrics; clones share the same registry
#[derive(Clone)]
pub struct DashboardMetrics {
    _private: (),
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DashboardMetricsInner {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new)
    }

    pub fn observe_training(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
        self.inner().trainings.inc();
    }

    pub fn inc_trainings_skipped(&self) {
        self.inner().trainings_skipped.inc();
    }

    pub fn observe_optimize(&self, duration_secs: f64, assignments: usize) {
        self.inner().optimize_latency_seconds.observe(duration_secs);
        self.inner().assignments_produced.inc_by(assignments as u64);
    }

    pub fn inc_optimize_errors(&self) {
        self.inner().optimize_errors.inc();
    }

    pub fn observe_detect(&self, duration_secs: f64, idle: usize) {
        self.inner().detect_latency_seconds.observe(duration_secs);
        self.inner().idle_resources_flagged.inc_by(idle as u64);
    }

    /// 0 untrained, 1 training, 2 ready
    pub fn set_model_state(&self, state: i64) {
        self.inner().model_state.set(state);
    }

    pub fn set_generation(&self, generation: &str) {
        self.inner().artifact_generation_info.reset();
        self.inner()
            .artifact_generation_info
            .with_label_values(&[generation])
            .set(1.0);
    }
}

/// JSON event log with a stable `event` field per transition
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn log_startup(&self, version: &str, generation: Option<&str>) {
        info!(
            event = "dashboard_started",
            node = %self.node_name,
            version = %version,
            generation = generation.unwrap_or("none"),
            "Cloud dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Cloud dashboard shutting down"
        );
    }

    pub fn log_training_completed(
        &self,
        generation: &str,
        train_size: usize,
        test_size: usize,
        inertia: f64,
        duration_ms: u64,
    ) {
        info!(
            event = "training_completed",
            node = %self.node_name,
            generation = %generation,
            train_size = train_size,
            test_size = test_size,
            inertia = inertia,
            duration_ms = duration_ms,
            "Model trained and artifacts published"
        );
    }

    pub fn log_training_skipped(&self, available: usize, required: usize) {
        warn!(
            event = "training_skipped",
            node = %self.node_name,
            available = available,
            required = required,
            "Not enough data to train"
        );
    }

    pub fn log_training_failed(&self, error: &str) {
        warn!(
            event = "training_failed",
            node = %self.node_name,
            error = %error,
            "Training failed, previous artifacts kept"
        );
    }

    pub fn log_idle_detected(&self, source: &str, total: usize, idle: usize, potential_savings: f64) {
        info!(
            event = "idle_resources_detected",
            node = %self.node_name,
            source = %source,
            total_analyzed = total,
            idle_count = idle,
            potential_savings = potential_savings,
            "Idle detection completed"
        );
    }

    pub fn log_optimizer_completed(&self, generation: Option<&str>, assignments: usize) {
        info!(
            event = "optimizer_completed",
            node = %self.node_name,
            generation = generation.unwrap_or("none"),
            assignments = assignments,
            "Optimization recommendations produced"
        );
    }

    pub fn log_model_unavailable(&self, reason: &str) {
        warn!(
            event = "model_unavailable",
            node = %self.node_name,
            reason = %reason,
            "Model artifacts unavailable"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_metrics_observations() {
        let metrics = DashboardMetrics::new();
        let again = metrics.clone();

        metrics.observe_training(0.25);
        metrics.inc_trainings_skipped();
        metrics.observe_optimize(0.002, 6);
        metrics.inc_optimize_errors();
        again.observe_detect(0.001, 2);
        again.set_model_state(2);
        again.set_generation("gen-000001");
        again.set_generation("gen-000002");
    }

    #[test]
    fn test_structured_logger_node_name() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name(), "test-node");
        logger.log_training_skipped(2, 3);
        logger.log_model_unavailable("no artifacts");
    }
}

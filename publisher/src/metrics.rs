//! Prometheus metrics for buildflux

use crate::error::{PublishError, Result};
use prometheus::{
    CounterVec, Encoder, Histogram, TextEncoder, register_counter_vec, register_histogram,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All buildflux metrics
pub struct Metrics {
    /// Points produced (by generator)
    pub points_generated: CounterVec,

    /// Generator runs that failed (by generator)
    pub generator_failures: CounterVec,

    /// Batched writes (by target, outcome)
    pub target_writes: CounterVec,

    /// Duration of one publication run
    pub publication_seconds: Histogram,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    #[allow(clippy::result_large_err)]
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            points_generated: register_counter_vec!(
                "buildflux_points_generated_total",
                "Total points produced by generators",
                &["generator"]
            )
            .map_err(|e| PublishError::Metrics(format!("points_generated: {e}")))?,

            generator_failures: register_counter_vec!(
                "buildflux_generator_failures_total",
                "Generator runs that failed and were skipped",
                &["generator"]
            )
            .map_err(|e| PublishError::Metrics(format!("generator_failures: {e}")))?,

            target_writes: register_counter_vec!(
                "buildflux_target_writes_total",
                "Batched writes attempted per target",
                &["target", "outcome"]
            )
            .map_err(|e| PublishError::Metrics(format!("target_writes: {e}")))?,

            publication_seconds: register_histogram!(
                "buildflux_publication_seconds",
                "Duration of one publication run",
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
            )
            .map_err(|e| PublishError::Metrics(format!("publication_seconds: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| PublishError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_points(&self, generator: &str, count: usize) {
        self.points_generated
            .with_label_values(&[generator])
            .inc_by(count as f64);
    }

    pub fn record_generator_failure(&self, generator: &str) {
        self.generator_failures.with_label_values(&[generator]).inc();
    }

    /// Record one write attempt, `outcome` is `ok`, `skipped` or the error kind
    pub fn record_write(&self, target: &str, outcome: &str) {
        self.target_writes
            .with_label_values(&[target, outcome])
            .inc();
    }

    pub fn record_publication(&self, seconds: f64) {
        self.publication_seconds.observe(seconds);
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_points(generator: &str, count: usize) {
    if let Some(m) = Metrics::get() {
        m.record_points(generator, count);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_generator_failure(generator: &str) {
    if let Some(m) = Metrics::get() {
        m.record_generator_failure(generator);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_write(target: &str, outcome: &str) {
    if let Some(m) = Metrics::get() {
        m.record_write(target, outcome);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_publication(seconds: f64) {
    if let Some(m) = Metrics::get() {
        m.record_publication(seconds);
    }
}

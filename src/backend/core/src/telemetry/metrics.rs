//! Prometheus metrics for action durations, store queries, and errors.
//!
//! Metric families:
//!
//! - `tickethub_action_duration_seconds`: histogram, labeled by action
//! - `tickethub_store_queries_total`: counter, labeled by entity and operation
//! - `tickethub_errors_total`: counter, labeled by code and category

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Prometheus exporter listen address (e.g., "0.0.0.0:9090")
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,

    /// Histogram buckets for action durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            endpoint: default_metrics_endpoint(),
            duration_buckets: default_duration_buckets(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_endpoint() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
}

/// Initialize the metrics subsystem and install the Prometheus exporter.
///
/// When disabled, metric macros still compile and record into the void.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<()> {
    if config.enabled {
        let addr: SocketAddr = config.endpoint.parse()?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(
                    "tickethub_action_duration_seconds".to_string(),
                ),
                &config.duration_buckets,
            )?
            .install()?;
    }

    describe_histogram!(
        "tickethub_action_duration_seconds",
        "Wall-clock duration of work-item actions"
    );
    describe_counter!(
        "tickethub_store_queries_total",
        "Store operations issued, by entity and operation"
    );
    describe_counter!(
        "tickethub_errors_total",
        "Errors raised, by code and category"
    );

    Ok(())
}

/// Record the duration of a work-item action.
pub fn record_action_duration(action: &'static str, elapsed: Duration) {
    histogram!("tickethub_action_duration_seconds", "action" => action)
        .record(elapsed.as_secs_f64());
}

/// Count a store operation as it passes through the scoping layer.
pub fn record_store_query(entity: &'static str, operation: &'static str) {
    counter!(
        "tickethub_store_queries_total",
        "entity" => entity,
        "operation" => operation,
    )
    .increment(1);
}

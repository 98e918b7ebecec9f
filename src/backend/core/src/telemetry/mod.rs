//! Telemetry: logging and metrics infrastructure.
//!
//! - **Logging**: Structured JSON/pretty logging with sensitive data redaction
//! - **Metrics**: Prometheus metrics for action durations, store queries, and errors
//!
//! # Example
//!
//! ```rust,no_run
//! use tickethub_core::telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, RedactionConfig, SensitiveFieldRedactor};
pub use metrics::{init_metrics, MetricsConfig};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Service name for identification in logs and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "tickethub-core".to_string()
}

fn default_environment() -> String {
    std::env::var("TICKETHUB_ENV").unwrap_or_else(|_| "development".to_string())
}

/// Initialize the full telemetry stack (logging, then metrics).
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.logging, &config.environment)?;
    init_metrics(&config.metrics)?;

    tracing::info!(
        service_name = %config.service_name,
        environment = %config.environment,
        "Telemetry initialized"
    );

    Ok(())
}

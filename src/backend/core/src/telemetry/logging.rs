//! Structured logging with JSON/pretty formats and sensitive data redaction.
//!
//! - JSON format for production environments
//! - Pretty format for development
//! - Per-module log level configuration
//! - Sensitive data redaction (emails, passwords, session tokens)

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global redactor instance for sensitive data.
static REDACTOR: OnceLock<SensitiveFieldRedactor> = OnceLock::new();

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty, or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default = "default_include_location")]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Span event configuration
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Redaction configuration
    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: default_include_location(),
            include_target: default_include_target(),
            span_events: SpanEventConfig::default(),
            redaction: RedactionConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Configuration for span event logging.
#[derive(Debug, Clone, Deserialize)]
pub struct SpanEventConfig {
    /// Log when spans are created
    #[serde(default)]
    pub on_new: bool,

    /// Log when spans are closed
    #[serde(default = "default_on_close")]
    pub on_close: bool,
}

impl Default for SpanEventConfig {
    fn default() -> Self {
        Self {
            on_new: false,
            on_close: default_on_close(),
        }
    }
}

impl SpanEventConfig {
    fn to_fmt_span(&self) -> FmtSpan {
        let mut span = FmtSpan::NONE;
        if self.on_new {
            span |= FmtSpan::NEW;
        }
        if self.on_close {
            span |= FmtSpan::CLOSE;
        }
        span
    }
}

/// Configuration for sensitive data redaction.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    /// Whether redaction is enabled
    #[serde(default = "default_redaction_enabled")]
    pub enabled: bool,

    /// Field names to redact (case-insensitive substring match)
    #[serde(default = "default_redacted_fields")]
    pub field_names: Vec<String>,

    /// Regex patterns to redact in values
    #[serde(default = "default_value_patterns")]
    pub value_patterns: Vec<String>,

    /// Replacement text for redacted values
    #[serde(default = "default_redaction_replacement")]
    pub replacement: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_redaction_enabled(),
            field_names: default_redacted_fields(),
            value_patterns: default_value_patterns(),
            replacement: default_redaction_replacement(),
        }
    }
}

/// Redactor for sensitive fields in log output.
///
/// TicketHub logs carry actor and tenant context on most events; user emails,
/// credentials, and session tokens must never reach log sinks in clear text.
#[derive(Debug, Clone)]
pub struct SensitiveFieldRedactor {
    field_names: Vec<String>,
    value_patterns: Vec<regex::Regex>,
    replacement: String,
    enabled: bool,
}

impl SensitiveFieldRedactor {
    /// Create a new redactor from configuration.
    pub fn new(config: &RedactionConfig) -> Self {
        Self {
            field_names: config
                .field_names
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            value_patterns: config
                .value_patterns
                .iter()
                .filter_map(|p| regex::Regex::new(p).ok())
                .collect(),
            replacement: config.replacement.clone(),
            enabled: config.enabled,
        }
    }

    /// Check if a field name should be redacted.
    pub fn should_redact_field(&self, field_name: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let lower = field_name.to_lowercase();
        self.field_names.iter().any(|f| lower.contains(f))
    }

    /// Redact a value if it matches any pattern.
    pub fn redact_value(&self, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }

        let mut result = value.to_string();
        for pattern in &self.value_patterns {
            result = pattern.replace_all(&result, &self.replacement).to_string();
        }
        result
    }

    /// Redact a field value, checking both field name and value patterns.
    pub fn redact(&self, field_name: &str, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }

        if self.should_redact_field(field_name) {
            return self.replacement.clone();
        }

        self.redact_value(value)
    }

    /// Get the global redactor instance.
    pub fn global() -> &'static SensitiveFieldRedactor {
        REDACTOR.get_or_init(|| SensitiveFieldRedactor::new(&RedactionConfig::default()))
    }
}

// Default value functions
fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_include_location() -> bool {
    true
}

fn default_include_target() -> bool {
    true
}

fn default_on_close() -> bool {
    true
}

fn default_redaction_enabled() -> bool {
    true
}

fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

fn default_redacted_fields() -> Vec<String> {
    vec![
        "password".to_string(),
        "passwd".to_string(),
        "secret".to_string(),
        "session_token".to_string(),
        "authorization".to_string(),
    ]
}

fn default_value_patterns() -> Vec<String> {
    vec![
        // Email addresses
        r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b".to_string(),
        // Session/JWT tokens
        r"eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+".to_string(),
    ]
}

/// Initialize the logging subsystem.
///
/// Sets up the tracing subscriber with the configured format and filters.
/// In development the pretty format is preferred unless explicitly overridden.
///
/// # Errors
///
/// Returns an error if the subscriber cannot be initialized.
pub fn init_logging(config: &LoggingConfig, environment: &str) -> anyhow::Result<()> {
    let _ = REDACTOR.set(SensitiveFieldRedactor::new(&config.redaction));

    let mut filter = EnvFilter::try_new(&config.level)?;
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse()?);
    }

    let format = if environment == "development" && config.format == LogFormat::Json {
        &LogFormat::Pretty
    } else {
        &config.format
    };

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(config.span_events.to_fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_span_events(config.span_events.to_fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_span_events(config.span_events.to_fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_patterns() {
        let config = RedactionConfig::default();
        let redactor = SensitiveFieldRedactor::new(&config);

        assert!(redactor.should_redact_field("password"));
        assert!(redactor.should_redact_field("SESSION_TOKEN"));
        assert!(!redactor.should_redact_field("tenant_id"));

        let redacted = redactor.redact_value("contact client@acme.com for details");
        assert!(!redacted.contains("client@acme.com"));
        assert!(redacted.contains("[REDACTED]"));

        let normal = "work item WI-42 moved to DONE";
        assert_eq!(redactor.redact_value(normal), normal);
    }

    #[test]
    fn test_redact_field_wins_over_value() {
        let redactor = SensitiveFieldRedactor::new(&RedactionConfig::default());
        assert_eq!(redactor.redact("password", "hunter2"), "[REDACTED]");
        assert_eq!(redactor.redact("title", "Fix login bug"), "Fix login bug");
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.redaction.enabled);
    }
}

//! Error handling for TicketHub Core.
//!
//! This module provides:
//! - A domain error taxonomy with stable machine-readable codes
//! - HTTP status code mapping for API responses
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use tickethub_core::error::{HubError, Result};
//!
//! fn load(slug: &str) -> Result<Tenant> {
//!     find(slug).ok_or_else(|| HubError::not_found("tenant", slug))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for TicketHub operations.
pub type Result<T> = std::result::Result<T, HubError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization
    PermissionDenied,
    AccessDenied,

    // Lookups
    NotFound,

    // Validation
    ValidationError,
    MissingRequiredField,
    InvalidEnumValue,

    // Store
    DuplicateRecord,
    StoreError,
    StoreConnectionFailed,

    // Serialization
    SerializationError,

    // Configuration / internal
    ConfigurationError,
    InternalError,
}

impl ErrorCode {
    /// Stable string form exposed to clients.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::DuplicateRecord => "DUPLICATE_RECORD",
            Self::StoreError => "STORE_ERROR",
            Self::StoreConnectionFailed => "STORE_CONNECTION_FAILED",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::ConfigurationError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::PermissionDenied | Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ValidationError | Self::MissingRequiredField | Self::InvalidEnumValue => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::DuplicateRecord => StatusCode::CONFLICT,
            Self::StoreConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::StoreError
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category for grouping in metrics.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::PermissionDenied | Self::AccessDenied => "authorization",
            Self::NotFound => "lookup",
            Self::ValidationError | Self::MissingRequiredField | Self::InvalidEnumValue => {
                "validation"
            }
            Self::DuplicateRecord | Self::StoreError | Self::StoreConnectionFailed => "store",
            Self::SerializationError => "serialization",
            Self::ConfigurationError => "configuration",
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for TicketHub Core.
///
/// Carries a stable error code, a client-safe message, and an optional source
/// error. Store errors propagate through this type unchanged in outcome; the
/// scoping layer never rewrites them.
#[derive(Error, Debug)]
pub struct HubError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Client-safe error message
    message: Cow<'static, str>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl HubError {
    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            message: message.into(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create a permission-denied error naming the role and action.
    pub fn permission_denied(role: impl fmt::Display, action: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            format!("User with role {} cannot perform action: {}", role, action),
        )
    }

    /// Create an access-denied error (actor is not the owner of a visible record).
    pub fn access_denied(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::AccessDenied, message)
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create an invalid-enum error for a closed enumeration.
    pub fn invalid_enum(kind: &'static str, value: &str) -> Self {
        Self::new(
            ErrorCode::InvalidEnumValue,
            format!("invalid {} value: {}", kind, value),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the client-safe message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.as_str();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.http_status() {
            s if s.is_server_error() => {
                error!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    message = %self.message,
                    source = ?self.source,
                    "Server-side error"
                );
            }
            StatusCode::FORBIDDEN => {
                warn!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    message = %self.message,
                    "Request denied"
                );
            }
            _ => {
                debug!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    message = %self.message,
                    "Client error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "tickethub_errors_total",
            "code" => self.code.as_str(),
            "category" => self.code.category(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response envelope for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Client-safe error message
    pub message: String,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&HubError> for ErrorResponse {
    fn from(error: &HubError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                message: error.message.to_string(),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for HubError {
    fn from(error: sqlx::Error) -> Self {
        let (code, message) = match &error {
            sqlx::Error::RowNotFound => (ErrorCode::NotFound, "The requested record was not found"),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    (
                        ErrorCode::DuplicateRecord,
                        "A record with this identifier already exists",
                    )
                } else {
                    (ErrorCode::StoreError, "A database error occurred")
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => (
                ErrorCode::StoreConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::StoreError, "A database error occurred"),
        };

        Self::new(code, message).with_source(error)
    }
}

impl From<serde_json::Error> for HubError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, "Failed to process JSON data").with_source(error)
    }
}

impl From<config::ConfigError> for HubError {
    fn from(error: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, "Configuration error occurred").with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(
            ErrorCode::PermissionDenied.http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ErrorCode::AccessDenied.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::ValidationError.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::DuplicateRecord.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_permission_denied_names_role_and_action() {
        let error = HubError::permission_denied("CLIENT", "manage:users");
        assert_eq!(error.code(), ErrorCode::PermissionDenied);
        assert!(error.message().contains("CLIENT"));
        assert!(error.message().contains("manage:users"));
    }

    #[test]
    fn test_stable_code_strings() {
        assert_eq!(ErrorCode::PermissionDenied.as_str(), "PERMISSION_DENIED");
        assert_eq!(ErrorCode::AccessDenied.as_str(), "ACCESS_DENIED");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
    }

    #[test]
    fn test_error_response_serialization() {
        let error = HubError::validation("title must not be empty");
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("VALIDATION_ERROR"));
        assert!(json.contains("title must not be empty"));
    }

    #[test]
    fn test_not_found_message() {
        let error = HubError::not_found("work item", "abc-123");
        assert_eq!(error.code(), ErrorCode::NotFound);
        assert!(error.message().contains("abc-123"));
    }
}

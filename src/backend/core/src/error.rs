//! Error handling for Tempo Core.
//!
//! This module provides:
//! - A crate-wide error type with codes, context and source chaining
//! - Error codes grouped by subsystem for machine-readable reporting
//! - Severity-aware logging with tracing integration
//! - Metrics integration for error tracking
//!
//! Domain errors (`ConstraintError`, `ResolutionError`, `ScheduleError`,
//! `NotificationError`) live next to the code that raises them and convert
//! into [`TempoError`] when they cross a subsystem boundary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tempo_core::error::{TempoError, Result, ErrorContext, ErrorCode};
//!
//! async fn load(queue: &dyn Queue, id: &JobId) -> Result<JobRecord> {
//!     queue.get(id).await.context("Failed to hydrate job record")
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::calendar::{ConstraintError, ResolutionError};
use crate::jobs::notify::NotificationError;
use crate::schedule::ScheduleError;

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Tempo operations.
pub type Result<T> = std::result::Result<T, TempoError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Constraint Errors (1000-1099)
    ConstraintOutOfBounds,
    IncompatibleTimeUnit,
    EmptyConstraint,

    // Schedule Errors (1100-1199)
    NoConstraintsSet,
    RuleInsatiable,
    SearchExhausted,
    InvalidSchedule,

    // Queue Errors (2000-2099)
    QueueBackendError,
    QueueConnectionFailed,
    RecordNotFound,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // Job Errors (3000-3099)
    HandlerNotFound,
    HandlerFailed,

    // Notification Errors (3100-3199)
    NotificationFailed,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::ConstraintOutOfBounds => 1000,
            Self::IncompatibleTimeUnit => 1001,
            Self::EmptyConstraint => 1002,

            Self::NoConstraintsSet => 1100,
            Self::RuleInsatiable => 1101,
            Self::SearchExhausted => 1102,
            Self::InvalidSchedule => 1103,

            Self::QueueBackendError => 2000,
            Self::QueueConnectionFailed => 2001,
            Self::RecordNotFound => 2002,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::HandlerNotFound => 3000,
            Self::HandlerFailed => 3001,

            Self::NotificationFailed => 3100,

            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,

            Self::InternalError => 9000,
            Self::UnknownError => 9099,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only backend failures are transient. Job handler outcomes are retried
    /// through the job's own error, never through this code.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueBackendError | Self::QueueConnectionFailed)
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "constraint",
            1100..=1199 => "schedule",
            2000..=2099 => "queue",
            2200..=2299 => "serialization",
            3000..=3099 => "job",
            3100..=3199 => "notification",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad constraint values, malformed schedules)
    Low,
    /// Operational issues (job failures, unsatisfiable schedules)
    Medium,
    /// System errors (backend failures, corrupt records)
    High,
    /// Errors that leave the process unable to make progress
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::ConstraintOutOfBounds
            | ErrorCode::IncompatibleTimeUnit
            | ErrorCode::EmptyConstraint
            | ErrorCode::InvalidSchedule
            | ErrorCode::NoConstraintsSet
            | ErrorCode::RecordNotFound => Self::Low,

            ErrorCode::RuleInsatiable
            | ErrorCode::SearchExhausted
            | ErrorCode::HandlerNotFound
            | ErrorCode::HandlerFailed
            | ErrorCode::NotificationFailed => Self::Medium,

            ErrorCode::QueueBackendError
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::QueueConnectionFailed
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Tempo Core.
#[derive(Error, Debug)]
pub struct TempoError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Short description, safe to show to operators
    message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for TempoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl TempoError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            message: message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both a public and an internal message.
    pub fn with_internal(
        code: ErrorCode,
        message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create a queue backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::QueueBackendError, "Queue backend operation failed", message)
    }

    /// Create a record-not-found error for a job id.
    pub fn record_not_found(job_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::RecordNotFound, format!("Job record not found: {}", job_id))
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the public message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "tempo_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category(),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| TempoError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| TempoError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| TempoError::new(ErrorCode::RecordNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| TempoError::new(code, "Value not present"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<ConstraintError> for TempoError {
    fn from(error: ConstraintError) -> Self {
        let code = match &error {
            ConstraintError::OutOfBounds { .. } => ErrorCode::ConstraintOutOfBounds,
            ConstraintError::IncompatibleTimeUnit { .. } => ErrorCode::IncompatibleTimeUnit,
            ConstraintError::EmptyConstraint { .. } => ErrorCode::EmptyConstraint,
        };
        TempoError::new(code, error.to_string()).with_source(error)
    }
}

impl From<ResolutionError> for TempoError {
    fn from(error: ResolutionError) -> Self {
        let code = match &error {
            ResolutionError::NoConstraintsSet => ErrorCode::NoConstraintsSet,
            ResolutionError::RuleInsatiable { .. } => ErrorCode::RuleInsatiable,
            ResolutionError::SearchExhausted { .. } => ErrorCode::SearchExhausted,
        };
        TempoError::new(code, error.to_string()).with_source(error)
    }
}

impl From<ScheduleError> for TempoError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::Constraint(inner) => inner.into(),
            ScheduleError::Resolution(inner) => inner.into(),
            other => TempoError::new(ErrorCode::InvalidSchedule, other.to_string()).with_source(other),
        }
    }
}

impl From<NotificationError> for TempoError {
    fn from(error: NotificationError) -> Self {
        TempoError::new(ErrorCode::NotificationFailed, error.to_string()).with_source(error)
    }
}

impl From<redis::RedisError> for TempoError {
    fn from(error: redis::RedisError) -> Self {
        let code = if error.is_connection_refusal() || error.is_io_error() || error.is_timeout() {
            ErrorCode::QueueConnectionFailed
        } else {
            ErrorCode::QueueBackendError
        };
        TempoError::with_internal(code, "Redis operation failed", error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for TempoError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_data() || error.is_syntax() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };
        TempoError::with_internal(code, "Failed to encode or decode JSON", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for TempoError {
    fn from(error: std::io::Error) -> Self {
        TempoError::with_internal(ErrorCode::InternalError, "I/O error", error.to_string())
            .with_source(error)
    }
}

impl From<config::ConfigError> for TempoError {
    fn from(error: config::ConfigError) -> Self {
        TempoError::with_internal(
            ErrorCode::ConfigurationError,
            "Failed to load configuration",
            error.to_string(),
        )
        .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::TimeUnit;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::ConstraintOutOfBounds.category(), "constraint");
        assert_eq!(ErrorCode::RuleInsatiable.category(), "schedule");
        assert_eq!(ErrorCode::QueueBackendError.category(), "queue");
        assert_eq!(ErrorCode::HandlerFailed.category(), "job");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
    }

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::QueueBackendError.is_retryable());
        assert!(ErrorCode::QueueConnectionFailed.is_retryable());
        assert!(!ErrorCode::ConstraintOutOfBounds.is_retryable());
        assert!(!ErrorCode::SearchExhausted.is_retryable());
        assert!(!ErrorCode::HandlerNotFound.is_retryable());
        assert!(!ErrorCode::HandlerFailed.is_retryable());
    }

    #[test]
    fn test_handler_codes() {
        assert_eq!(ErrorCode::HandlerNotFound.numeric_code(), 3000);
        assert_eq!(ErrorCode::HandlerFailed.category(), "job");
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::HandlerNotFound), ErrorSeverity::Medium);
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::ConstraintOutOfBounds),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::RuleInsatiable),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::QueueBackendError),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::QueueConnectionFailed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_constraint_error_conversion() {
        let error: TempoError = ConstraintError::OutOfBounds {
            unit: TimeUnit::Hour,
            value: 24,
            lower: 0,
            upper: 23,
        }
        .into();
        assert_eq!(error.code(), ErrorCode::ConstraintOutOfBounds);
        assert!(error.message().contains("24"));
    }

    #[test]
    fn test_resolution_error_conversion() {
        let error: TempoError = ResolutionError::NoConstraintsSet.into();
        assert_eq!(error.code(), ErrorCode::NoConstraintsSet);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_option_context() {
        let value: Option<u32> = None;
        let error = value.context("missing record").unwrap_err();
        assert_eq!(error.code(), ErrorCode::RecordNotFound);
    }

    #[test]
    fn test_error_display() {
        let error = TempoError::with_internal(
            ErrorCode::QueueBackendError,
            "Queue backend operation failed",
            "Connection refused: localhost:6379",
        );

        let display = format!("{}", error);
        assert!(display.contains("QueueBackendError"));
        assert!(display.contains("Queue backend operation failed"));
        assert!(display.contains("Connection refused"));
    }
}

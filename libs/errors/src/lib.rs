//! Shared error classification
//!
//! Every service keeps its own domain error enum (built with `thiserror`) and
//! implements [`CategorizedError`] on it. That gives callers one place to ask
//! for a stable error code, a category for metrics, a severity, retry hints and
//! the log level an occurrence should be reported at.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Classification
// ============================================================================

/// Error category enum - used for classification and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Network,
    Timeout,

    // Request layer
    Validation,
    Permission,

    // Protocol/communication layer
    Protocol,
    Connection,

    // Device business layer
    Business,

    // System level
    Internal,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION",
            Self::Permission => "PERMISSION",
            Self::Protocol => "PROTOCOL",
            Self::Connection => "CONNECTION",
            Self::Business => "BUSINESS",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently an operator should look at an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error capability trait
// ============================================================================

/// Error capability trait
///
/// Defines the interface that service error types implement so that logging,
/// result mapping and retry decisions do not need to know the concrete enum.
pub trait CategorizedError: std::error::Error + Send + Sync + 'static {
    /// Get error code (for results, logs, monitoring)
    fn error_code(&self) -> &'static str;

    /// Get error category (for classification/metrics)
    fn category(&self) -> ErrorCategory;

    /// Severity, derived from the category unless overridden
    fn severity(&self) -> Severity {
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Configuration => Severity::High,
            ErrorCategory::Validation | ErrorCategory::Permission | ErrorCategory::Business => {
                Severity::Low
            },
            _ => Severity::Medium,
        }
    }

    /// Whether the error is retryable (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Connection
        )
    }

    /// Recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> u64 {
        match self.category() {
            ErrorCategory::Network => 1000,
            ErrorCategory::Timeout => 500,
            ErrorCategory::Connection => 1500,
            _ => 0,
        }
    }

    /// Maximum retry attempts
    fn max_retries(&self) -> u32 {
        if self.is_retryable() {
            3
        } else {
            0
        }
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Configuration => Level::ERROR,
            ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Connection
            | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::Permission | ErrorCategory::Business => {
                Level::INFO
            },
            ErrorCategory::Unknown => Level::WARN,
        }
    }

    /// Serializable description of this error
    fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.error_code().to_string(),
            message: self.to_string(),
            category: self.category(),
            severity: self.severity(),
        }
    }
}

/// Emit a tracing event for `err` at the level it asks for.
///
/// `tracing` macros need the level at compile time, hence the match.
pub fn log_error<E: CategorizedError + ?Sized>(err: &E, context: &str) {
    let code = err.error_code();
    match err.log_level() {
        tracing::Level::ERROR => tracing::error!(code, "{}: {}", context, err),
        tracing::Level::WARN => tracing::warn!(code, "{}: {}", context, err),
        tracing::Level::INFO => tracing::info!(code, "{}: {}", context, err),
        tracing::Level::DEBUG => tracing::debug!(code, "{}: {}", context, err),
        tracing::Level::TRACE => tracing::trace!(code, "{}: {}", context, err),
    }
}

// ============================================================================
// ErrorInfo
// ============================================================================

/// Catalog entry / serializable view of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code
    pub code: String,
    /// Human readable message
    pub message: String,
    pub category: ErrorCategory,
    pub severity: Severity,
}

impl ErrorInfo {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
        severity: Severity,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            category,
            severity,
        }
    }

    /// JSON rendering used by log sinks and CLI output
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "category": self.category,
            "severity": self.severity,
        })
    }
}

//! Error types for the RS485 adapter
//!
//! Each layer has its own enum (frame parsing, validation, connection,
//! business translation, frame building). [`Rs485Error`] wraps them and maps
//! every variant onto a stable system code that the status mapper understands.

use errors::{CategorizedError, ErrorCategory};
use thiserror::Error;

use crate::core::types::DeviceId;

/// Structural problems with an inbound frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame too short: {len} bytes, need at least {needed}")]
    TooShort { len: usize, needed: usize },

    #[error("bad start byte 0x{0:02X}")]
    BadStartByte(u8),

    #[error("CRC mismatch: expected 0x{expected:04X}, received 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("invalid hex input: {0}")]
    InvalidHex(String),
}

/// Frame passed parsing but is not acceptable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("device address must not be 0")]
    InvalidAddress,

    #[error("function code must not be 0")]
    InvalidFunctionCode,

    #[error("permission denied for '{operation}': {reason}")]
    PermissionDenied { operation: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("device {0} is not connected")]
    NotConnected(DeviceId),

    #[error("unsupported device model: {0}")]
    UnsupportedModel(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessError {
    #[error("unknown function code 0x{0:02X}")]
    UnknownFunction(u8),

    #[error("malformed payload for function 0x{function_code:02X}: {reason}")]
    MalformedPayload { function_code: u8, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("encode failure: {0}")]
    EncodeFailure(String),
}

/// Top level adapter error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rs485Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Business error: {0}")]
    Business(#[from] BusinessError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Rs485Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_connected(device_id: DeviceId) -> Self {
        Self::Connection(ConnectionError::NotConnected(device_id))
    }

    pub fn permission_denied(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::PermissionDenied {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    /// Message without the layer prefix, used in mapped results
    pub fn detail(&self) -> String {
        match self {
            Self::Parse(e) => e.to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Connection(e) => e.to_string(),
            Self::Business(e) => e.to_string(),
            Self::Build(e) => e.to_string(),
            Self::Config(msg) | Self::Cancelled(msg) | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl From<common::Error> for Rs485Error {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::Parse(msg) => Self::Parse(ParseError::InvalidHex(msg)),
            common::Error::Config(msg) => Self::Config(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<figment::Error> for Rs485Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl CategorizedError for Rs485Error {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Business(_) => "BUSINESS_ERROR",
            Self::Build(_) => "BUILD_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Cancelled(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(_) => ErrorCategory::Protocol,
            Self::Validation(ValidationError::PermissionDenied { .. }) => ErrorCategory::Permission,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Business(_) => ErrorCategory::Business,
            Self::Build(_) => ErrorCategory::Protocol,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Cancelled(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    fn is_retryable(&self) -> bool {
        // A CRC failure is usually line noise; the next poll may be clean
        matches!(self, Self::Parse(ParseError::CrcMismatch { .. }))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Rs485Error>;

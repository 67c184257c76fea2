//! System error codes to RS485 protocol error codes

use std::collections::BTreeMap;
use std::fmt;

use errors::{CategorizedError, ErrorCategory, ErrorInfo, Severity};
use serde::Serialize;

use super::types::DeviceId;
use crate::error::Rs485Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolErrorCode {
    CrcError,
    TimeoutError,
    AddressError,
    FunctionError,
    DataFormatError,
    UnknownError,
}

impl ProtocolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrcError => "CRC_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::AddressError => "ADDRESS_ERROR",
            Self::FunctionError => "FUNCTION_ERROR",
            Self::DataFormatError => "DATA_FORMAT_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ProtocolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapped error carried by failure results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolErrorResponse {
    /// Code the failure was raised with, e.g. `PARSE_ERROR`
    pub system_code: String,
    pub error_code: ProtocolErrorCode,
    pub error_message: String,
    pub device_id: Option<DeviceId>,
    pub timestamp_ms: i64,
}

pub fn map_error_code(system_code: &str) -> ProtocolErrorCode {
    match system_code {
        "PARSE_ERROR" => ProtocolErrorCode::DataFormatError,
        "TIMEOUT_ERROR" => ProtocolErrorCode::TimeoutError,
        "CONNECTION_ERROR" => ProtocolErrorCode::AddressError,
        "BUSINESS_ERROR" => ProtocolErrorCode::FunctionError,
        _ => ProtocolErrorCode::UnknownError,
    }
}

pub fn map_error_message(system_code: &str, message: &str) -> String {
    let prefix = match system_code {
        "PARSE_ERROR" => "Data format parse failed",
        "TIMEOUT_ERROR" => "Device response timeout",
        "CONNECTION_ERROR" => "Device connection error",
        "BUSINESS_ERROR" => "Business logic error",
        _ => "Unknown error",
    };
    format!("{}: {}", prefix, message)
}

pub fn map_error(
    system_code: &str,
    message: &str,
    device_id: Option<DeviceId>,
    timestamp_ms: i64,
) -> ProtocolErrorResponse {
    ProtocolErrorResponse {
        system_code: system_code.to_string(),
        error_code: map_error_code(system_code),
        error_message: map_error_message(system_code, message),
        device_id,
        timestamp_ms,
    }
}

/// Map an adapter error using its system code and unprefixed detail
pub fn from_error(err: &Rs485Error, device_id: Option<DeviceId>, timestamp_ms: i64) -> ProtocolErrorResponse {
    map_error(err.error_code(), &err.detail(), device_id, timestamp_ms)
}

/// Catalog of protocol error codes with category and severity
pub fn error_code_mapping() -> BTreeMap<ProtocolErrorCode, ErrorInfo> {
    use ProtocolErrorCode::*;

    [
        (CrcError, "CRC check failed", ErrorCategory::Protocol, Severity::High),
        (TimeoutError, "communication timeout", ErrorCategory::Network, Severity::Medium),
        (AddressError, "device address error", ErrorCategory::Protocol, Severity::Medium),
        (FunctionError, "function code not supported", ErrorCategory::Protocol, Severity::Low),
        (DataFormatError, "data format error", ErrorCategory::Protocol, Severity::Medium),
    ]
    .into_iter()
    .map(|(code, message, category, severity)| {
        (code, ErrorInfo::new(code.as_str(), message, category, severity))
    })
    .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::ParseError;

    #[test]
    fn test_code_lookup() {
        assert_eq!(map_error_code("PARSE_ERROR"), ProtocolErrorCode::DataFormatError);
        assert_eq!(map_error_code("TIMEOUT_ERROR"), ProtocolErrorCode::TimeoutError);
        assert_eq!(map_error_code("CONNECTION_ERROR"), ProtocolErrorCode::AddressError);
        assert_eq!(map_error_code("BUSINESS_ERROR"), ProtocolErrorCode::FunctionError);
        assert_eq!(map_error_code("VALIDATION_ERROR"), ProtocolErrorCode::UnknownError);
        assert_eq!(map_error_code(""), ProtocolErrorCode::UnknownError);
    }

    #[test]
    fn test_message_prefix() {
        let response = map_error("TIMEOUT_ERROR", "no reply in 3000ms", Some(4), 99);
        assert_eq!(response.error_message, "Device response timeout: no reply in 3000ms");
        assert_eq!(response.device_id, Some(4));
        assert_eq!(response.timestamp_ms, 99);

        let response = map_error("WHATEVER", "boom", None, 0);
        assert_eq!(response.error_code, ProtocolErrorCode::UnknownError);
        assert_eq!(response.error_message, "Unknown error: boom");
    }

    #[test]
    fn test_from_adapter_error() {
        let err: Rs485Error = ParseError::BadStartByte(0x12).into();
        let response = from_error(&err, Some(1), 0);
        assert_eq!(response.system_code, "PARSE_ERROR");
        assert_eq!(response.error_code, ProtocolErrorCode::DataFormatError);
        assert_eq!(
            response.error_message,
            "Data format parse failed: bad start byte 0x12"
        );
    }

    #[test]
    fn test_catalog() {
        let catalog = error_code_mapping();
        assert_eq!(catalog.len(), 5);

        let crc = &catalog[&ProtocolErrorCode::CrcError];
        assert_eq!(crc.code, "CRC_ERROR");
        assert_eq!(crc.category, ErrorCategory::Protocol);
        assert_eq!(crc.severity, Severity::High);

        let timeout = &catalog[&ProtocolErrorCode::TimeoutError];
        assert_eq!(timeout.category, ErrorCategory::Network);
        assert_eq!(timeout.severity, Severity::Medium);

        assert_eq!(catalog[&ProtocolErrorCode::FunctionError].severity, Severity::Low);
        assert!(!catalog.contains_key(&ProtocolErrorCode::UnknownError));
    }
}

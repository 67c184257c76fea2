//! Value types returned by the protocol manager

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error_mapping::ProtocolErrorResponse;
use crate::protocols::rs485::BusinessData;

pub type DeviceId = u64;

/// Identity a device presents at initialization or registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_model: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    pub fn new(device_model: impl Into<String>) -> Self {
        Self {
            device_model: device_model.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Uninitialized,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Offline,
    Unhealthy,
    Warning,
    Healthy,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterStatus {
    /// No devices registered
    Idle,
    /// Every registered device is connected
    Running,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PermissionDecision {
    Permit,
    Deny { reason: String },
}

impl PermissionDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::Permit)
    }
}

/// Point-in-time view of one device connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSnapshot {
    pub device_id: DeviceId,
    pub device_model: String,
    pub connected: bool,
    pub authenticated: bool,
    pub write_enabled: bool,
    pub connection_time_ms: i64,
    pub last_heartbeat_ms: i64,
    pub last_activity_ms: i64,
    pub message_count: u64,
    pub error_count: u64,
    pub average_response_time_ms: f64,
    pub uptime_ms: i64,
    /// Wall-clock millis the snapshot was taken at
    pub taken_at_ms: i64,
}

impl ConnectionSnapshot {
    /// errors / (messages + errors), 0 when nothing happened yet
    pub fn error_rate(&self) -> f64 {
        let total = self.message_count + self.error_count;
        if total == 0 {
            0.0
        } else {
            self.error_count as f64 / total as f64
        }
    }

    pub fn idle_ms(&self) -> i64 {
        (self.taken_at_ms - self.last_activity_ms).max(0)
    }
}

/// Result of the per-function business handler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BusinessOutcome {
    CoilStatus {
        total: usize,
        active: usize,
    },
    RegisterSummary {
        count: usize,
        sum: u64,
        average: f64,
        min: u16,
        max: u16,
    },
    CoilWriteAck {
        address: u16,
        value: bool,
    },
    RegisterWriteAck {
        address: u16,
        value: u16,
    },
    MultipleWriteAck {
        address: u16,
        quantity: u16,
        written: usize,
    },
    Passthrough {
        function_code: u8,
        length: usize,
    },
    NoData {
        function_code: u8,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub device_id: DeviceId,
    pub success: bool,
    /// `RS485-<id>` on success
    pub connection_id: Option<String>,
    pub protocol_type: &'static str,
    pub error: Option<ProtocolErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub device_id: DeviceId,
    pub success: bool,
    pub device_address: Option<u8>,
    pub function_code: Option<u8>,
    pub business_data: Option<BusinessData>,
    pub outcome: Option<BusinessOutcome>,
    pub response_time_ms: u64,
    pub error: Option<ProtocolErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResult {
    pub device_id: DeviceId,
    pub success: bool,
    pub snapshot: Option<ConnectionSnapshot>,
    pub health_score: Option<f64>,
    pub health_status: Option<HealthStatus>,
    pub error: Option<ProtocolErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub device_id: DeviceId,
    pub success: bool,
    pub frame: Option<Bytes>,
    /// Space separated upper-case hex of `frame`
    pub frame_hex: Option<String>,
    pub error: Option<ProtocolErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResult {
    pub device_id: DeviceId,
    pub success: bool,
    /// `RS485-REG-<id>` on success
    pub registration_id: Option<String>,
    pub device_info: DeviceInfo,
    pub protocol_type: &'static str,
    pub registered_at_ms: i64,
    pub error: Option<ProtocolErrorResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_id: DeviceId,
    pub online: bool,
    pub state: ConnectionState,
    pub connection_id: Option<String>,
    pub snapshot: Option<ConnectionSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounters {
    pub messages: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStatistics {
    pub total_connections: usize,
    pub active_connections: usize,
    pub message_count: u64,
    pub error_count: u64,
    /// Errors as a percentage of messages
    pub error_rate: f64,
    pub uptime_ms: i64,
    pub operations: BTreeMap<String, OperationCounters>,
}

impl PerformanceStatistics {
    /// `error_rate` rendered with two decimals, e.g. `"12.50%"`
    pub fn error_rate_display(&self) -> String {
        format!("{:.2}%", self.error_rate)
    }
}

/// Static description of the adapter
#[derive(Debug, Clone, Serialize)]
pub struct AdapterInfo {
    pub protocol_type: &'static str,
    pub manufacturer: &'static str,
    pub version: &'static str,
    pub supported_models: usize,
}

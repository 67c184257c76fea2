//! RS485 device protocol adapter
//!
//! Turns raw RS485 / Modbus-RTU style frames from field devices into typed
//! business data and builds response frames going the other way. Devices are
//! tracked in a concurrent registry with link state, health scoring and
//! per-operation statistics; periodic supervisors drop devices that stop
//! sending heartbeats.
//!
//! ```no_run
//! use rs485srv::{DeviceInfo, ProtocolManager, SerialConfigPatch};
//!
//! # async fn demo() -> rs485srv::Result<()> {
//! let manager = ProtocolManager::builder().build();
//! manager.start();
//!
//! let init = manager
//!     .initialize_device(1, DeviceInfo::new("TEMP_SENSOR_485_V1"), SerialConfigPatch::default())
//!     .await?;
//! assert!(init.success);
//!
//! let result = manager
//!     .process_device_message_hex(1, "AA 01 03 04 00 0A 00 14 0B 32")
//!     .await?;
//! println!("{:?}", result.outcome);
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocols;
pub mod runtime;

pub use crate::config::{AppConfig, SerialConfig, SerialConfigPatch};
pub use crate::core::manager::{ProtocolManager, ProtocolManagerBuilder};
pub use crate::core::types::{
    AdapterStatus, BuildResult, BusinessOutcome, DeviceId, DeviceInfo, HeartbeatResult,
    HealthStatus, InitResult, PermissionDecision, ProcessResult,
};
pub use crate::error::{Result, Rs485Error};
pub use crate::protocols::rs485::BusinessData;

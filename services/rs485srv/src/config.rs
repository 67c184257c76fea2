//! Service configuration
//!
//! - `app`: the service file (`rs485srv.yaml`) merged with `RS485SRV_*` environment
//! - `serial`: per-device serial link settings

pub mod app;
pub mod serial;

pub use app::{AppConfig, DeviceEntry, LoggingSection, ProtocolSection, ServiceSection};
pub use serial::{Parity, SerialConfig, SerialConfigPatch};

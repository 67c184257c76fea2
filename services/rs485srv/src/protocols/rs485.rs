//! RS485 / Modbus-RTU style framing
//!
//! Wire layout:
//!
//! ```text
//! [0xAA]? [address:1][function:1][length:1][payload:length][crc_lo:1][crc_hi:1]
//! ```

pub mod constants;
pub mod crc;
pub mod frame;
pub mod models;
pub mod translator;

pub use constants::FunctionCode;
pub use crc::crc16_modbus;
pub use frame::{build_frame, parse_frame, validate_frame, Frame, ParseMode};
pub use models::{DeviceModelCatalog, StaticModelCatalog};
pub use translator::{decode_business_data, encode_business_data, BusinessData};

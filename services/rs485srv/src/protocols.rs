//! Protocol implementations
//!
//! This module contains the RS485 framing and payload translation used by the
//! protocol manager.

pub mod rs485;

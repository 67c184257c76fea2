//! RS485 adapter constants

// ============================================================================
// Adapter identity
// ============================================================================

pub const PROTOCOL_TYPE: &str = "RS485_PHYSICAL_V1_0";
pub const MANUFACTURER: &str = "INDUSTRIAL_RS485";
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Prefix of the connection handle returned by device initialization
pub const CONNECTION_PREFIX: &str = "RS485";
/// Prefix of registration ids
pub const REGISTRATION_PREFIX: &str = "RS485-REG";

// ============================================================================
// Frame layout
// ============================================================================

/// Optional framing byte; the header starts right after it
pub const START_BYTE: u8 = 0xAA;
/// Alternate start byte; the header starts at offset 0
pub const ALT_START_BYTE: u8 = 0x55;

/// Smallest buffer the parser will look at
pub const MIN_FRAME_LEN: usize = 4;
/// address + function + length
pub const HEADER_LEN: usize = 3;
pub const CRC_LEN: usize = 2;
/// The length field is a single byte
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Value of an "on" single coil write
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Function codes
// ============================================================================

/// Function codes understood by the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    Other(u8),
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            other => Self::Other(other),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(fc: FunctionCode) -> Self {
        match fc {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteSingleCoil => 0x05,
            FunctionCode::WriteSingleRegister => 0x06,
            FunctionCode::WriteMultipleCoils => 0x0F,
            FunctionCode::WriteMultipleRegisters => 0x10,
            FunctionCode::Other(code) => code,
        }
    }
}

impl FunctionCode {
    /// Operation name used for permission checks; `None` for unknown codes
    pub fn operation_name(&self) -> Option<&'static str> {
        match self {
            Self::ReadCoils => Some("read_coils"),
            Self::ReadDiscreteInputs => Some("read_discrete_inputs"),
            Self::ReadHoldingRegisters => Some("read_holding_registers"),
            Self::ReadInputRegisters => Some("read_input_registers"),
            Self::WriteSingleCoil => Some("write_single_coil"),
            Self::WriteSingleRegister => Some("write_single_register"),
            Self::WriteMultipleCoils => Some("write_multiple_coils"),
            Self::WriteMultipleRegisters => Some("write_multiple_registers"),
            Self::Other(_) => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
            Self::Other(_) => "Unknown",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::WriteSingleCoil
                | Self::WriteSingleRegister
                | Self::WriteMultipleCoils
                | Self::WriteMultipleRegisters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_conversion() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x0F, 0x10, 0x2B] {
            assert_eq!(u8::from(FunctionCode::from(code)), code);
        }
        assert_eq!(FunctionCode::from(0x2B), FunctionCode::Other(0x2B));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(
            FunctionCode::ReadHoldingRegisters.operation_name(),
            Some("read_holding_registers")
        );
        assert!(FunctionCode::WriteMultipleCoils.is_write());
        assert!(!FunctionCode::ReadCoils.is_write());
        assert_eq!(FunctionCode::Other(0x41).operation_name(), None);
    }
}

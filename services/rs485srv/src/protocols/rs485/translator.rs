//! Business data translation per function code
//!
//! Decoding never fails: malformed payloads are logged and come back with
//! their values left out, so callers see "no business data" rather than an
//! error. Encoding is strict and rejects data that does not fit the code.

use serde::Serialize;
use tracing::warn;

use super::constants::{FunctionCode, COIL_OFF, COIL_ON};
use crate::error::BusinessError;

/// Typed payload of a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusinessData {
    /// FC01 / FC02
    CoilRead { values: Option<Vec<bool>> },
    /// FC03 / FC04
    RegisterRead { values: Option<Vec<u16>> },
    /// FC05
    SingleCoilWrite { address: u16, value: bool },
    /// FC06
    SingleRegisterWrite { address: u16, value: u16 },
    /// FC0F
    MultipleCoilsWrite {
        address: u16,
        quantity: u16,
        values: Option<Vec<bool>>,
    },
    /// FC10
    MultipleRegistersWrite {
        address: u16,
        quantity: u16,
        values: Option<Vec<u16>>,
    },
    /// Function codes the translator does not know
    Raw { data: Vec<u8> },
    /// Payload empty or too short to carry the fixed fields
    Unavailable { reason: String },
}

impl BusinessData {
    /// Number of decoded values; absent when decoding failed
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::CoilRead { values } | Self::MultipleCoilsWrite { values, .. } => {
                values.as_ref().map(Vec::len)
            },
            Self::RegisterRead { values } | Self::MultipleRegistersWrite { values, .. } => {
                values.as_ref().map(Vec::len)
            },
            Self::SingleCoilWrite { .. } | Self::SingleRegisterWrite { .. } => Some(1),
            Self::Raw { data } => Some(data.len()),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CoilRead { .. } => "coil_read",
            Self::RegisterRead { .. } => "register_read",
            Self::SingleCoilWrite { .. } => "single_coil_write",
            Self::SingleRegisterWrite { .. } => "single_register_write",
            Self::MultipleCoilsWrite { .. } => "multiple_coils_write",
            Self::MultipleRegistersWrite { .. } => "multiple_registers_write",
            Self::Raw { .. } => "raw",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Unpack bits, least significant bit of each byte first
pub fn unpack_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |bit| (byte >> bit) & 0x01 == 1))
        .collect()
}

/// Pack bits, least significant bit first; a trailing partial byte is zero padded
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &on)| if on { acc | (1 << i) } else { acc })
        })
        .collect()
}

/// Big-endian u16 groups; `None` for an odd byte count
pub fn unpack_registers(bytes: &[u8]) -> Option<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

fn pack_registers(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

#[inline]
fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn registers_or_warn(function_code: u8, bytes: &[u8]) -> Option<Vec<u16>> {
    let values = unpack_registers(bytes);
    if values.is_none() {
        warn!(
            "FC={:02X}: odd register byte count {}, values omitted",
            function_code,
            bytes.len()
        );
    }
    values
}

fn unavailable(function_code: u8, reason: impl Into<String>) -> BusinessData {
    let reason = reason.into();
    warn!("FC={:02X}: no business data ({})", function_code, reason);
    BusinessData::Unavailable { reason }
}

/// Decode a payload according to its function code
pub fn decode_business_data(function_code: u8, payload: &[u8]) -> BusinessData {
    if payload.is_empty() {
        return BusinessData::Unavailable {
            reason: "empty payload".to_string(),
        };
    }

    match FunctionCode::from(function_code) {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => BusinessData::CoilRead {
            values: Some(unpack_bits(payload)),
        },
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            BusinessData::RegisterRead {
                values: registers_or_warn(function_code, payload),
            }
        },
        FunctionCode::WriteSingleCoil => {
            if payload.len() < 2 {
                return unavailable(function_code, "missing coil address");
            }
            let value = payload.len() >= 4 && be_u16(payload, 2) == COIL_ON;
            BusinessData::SingleCoilWrite {
                address: be_u16(payload, 0),
                value,
            }
        },
        FunctionCode::WriteSingleRegister => {
            if payload.len() < 4 {
                return unavailable(function_code, "missing register address or value");
            }
            BusinessData::SingleRegisterWrite {
                address: be_u16(payload, 0),
                value: be_u16(payload, 2),
            }
        },
        FunctionCode::WriteMultipleCoils => {
            if payload.len() < 4 {
                return unavailable(function_code, "missing address or quantity");
            }
            BusinessData::MultipleCoilsWrite {
                address: be_u16(payload, 0),
                quantity: be_u16(payload, 2),
                values: Some(unpack_bits(&payload[4..])),
            }
        },
        FunctionCode::WriteMultipleRegisters => {
            if payload.len() < 4 {
                return unavailable(function_code, "missing address or quantity");
            }
            BusinessData::MultipleRegistersWrite {
                address: be_u16(payload, 0),
                quantity: be_u16(payload, 2),
                values: registers_or_warn(function_code, &payload[4..]),
            }
        },
        FunctionCode::Other(_) => BusinessData::Raw {
            data: payload.to_vec(),
        },
    }
}

/// Encode business data into a payload for `function_code`
pub fn encode_business_data(function_code: u8, data: &BusinessData) -> Result<Vec<u8>, BusinessError> {
    let fc = FunctionCode::from(function_code);
    let malformed = |reason: String| BusinessError::MalformedPayload {
        function_code,
        reason,
    };

    match (fc, data) {
        (FunctionCode::Other(code), _) => Err(BusinessError::UnknownFunction(code)),

        (
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs,
            BusinessData::CoilRead { values: Some(values) },
        ) => Ok(pack_bits(values)),

        (
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters,
            BusinessData::RegisterRead { values: Some(values) },
        ) => Ok(pack_registers(values)),

        (FunctionCode::WriteSingleCoil, BusinessData::SingleCoilWrite { address, value }) => {
            let state = if *value { COIL_ON } else { COIL_OFF };
            Ok([address.to_be_bytes(), state.to_be_bytes()].concat())
        },

        (FunctionCode::WriteSingleRegister, BusinessData::SingleRegisterWrite { address, value }) => {
            Ok([address.to_be_bytes(), value.to_be_bytes()].concat())
        },

        (
            FunctionCode::WriteMultipleCoils,
            BusinessData::MultipleCoilsWrite {
                address,
                quantity,
                values,
            },
        ) => {
            let mut out = [address.to_be_bytes(), quantity.to_be_bytes()].concat();
            if let Some(values) = values {
                out.extend(pack_bits(values));
            }
            Ok(out)
        },

        (
            FunctionCode::WriteMultipleRegisters,
            BusinessData::MultipleRegistersWrite {
                address,
                quantity,
                values,
            },
        ) => {
            let mut out = [address.to_be_bytes(), quantity.to_be_bytes()].concat();
            if let Some(values) = values {
                out.extend(pack_registers(values));
            }
            Ok(out)
        },

        (_, BusinessData::CoilRead { values: None } | BusinessData::RegisterRead { values: None }) => {
            Err(malformed("no values to encode".to_string()))
        },

        (fc, other) => Err(malformed(format!(
            "{} cannot carry {} data",
            fc.description(),
            other.kind()
        ))),
    }
}

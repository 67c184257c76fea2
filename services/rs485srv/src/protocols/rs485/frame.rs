//! Frame parsing and assembly

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constants::{
    FunctionCode, ALT_START_BYTE, CRC_LEN, HEADER_LEN, MAX_PAYLOAD_LEN, MIN_FRAME_LEN, START_BYTE,
};
use super::crc::{crc16_modbus, crc_from_wire};
use crate::core::types::DeviceId;
use crate::error::{BuildError, ParseError, ValidationError};

/// How to treat a frame whose declared payload does not fit in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Accept the header, report an empty payload and no CRC
    #[default]
    Lenient,
    /// Reject with `TooShort`
    Strict,
}

/// A structurally parsed frame. Payload decoding happens in the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Set by the manager once the frame is attributed to a device
    pub device_id: Option<DeviceId>,
    pub device_address: u8,
    pub function_code: u8,
    pub payload: Bytes,
    /// Received CRC, absent when a lenient parse found no trailer
    pub crc: Option<u16>,
    pub raw: Bytes,
    /// Wall-clock millis, zero until stamped
    pub receive_time_ms: i64,
}

impl Frame {
    pub fn function(&self) -> FunctionCode {
        FunctionCode::from(self.function_code)
    }

    /// Attribute the frame to a device and record when it arrived
    pub fn stamped(mut self, device_id: DeviceId, receive_time_ms: i64) -> Self {
        self.device_id = Some(device_id);
        self.receive_time_ms = receive_time_ms;
        self
    }
}

/// Parse a raw buffer into a [`Frame`], checking the trailing CRC when present.
pub fn parse_frame(raw: Bytes, mode: ParseMode) -> Result<Frame, ParseError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(ParseError::TooShort {
            len: raw.len(),
            needed: MIN_FRAME_LEN,
        });
    }

    let offset = match raw[0] {
        START_BYTE => 1,
        ALT_START_BYTE => 0,
        other => return Err(ParseError::BadStartByte(other)),
    };

    let device_address = raw[offset];
    let function_code = raw[offset + 1];
    let declared_len = raw[offset + 2] as usize;

    let payload_start = offset + HEADER_LEN;
    let crc_offset = payload_start + declared_len;
    let needed = crc_offset + CRC_LEN;

    let (payload, crc) = if raw.len() >= needed {
        let received = crc_from_wire(raw[crc_offset], raw[crc_offset + 1]);
        let expected = crc16_modbus(&raw[..crc_offset]);
        if expected != received {
            return Err(ParseError::CrcMismatch {
                expected,
                actual: received,
            });
        }
        (raw.slice(payload_start..crc_offset), Some(received))
    } else {
        match mode {
            ParseMode::Lenient => {
                debug!(
                    "Short frame accepted: declared {} payload bytes, buffer has {} of {} needed",
                    declared_len,
                    raw.len(),
                    needed
                );
                (Bytes::new(), None)
            },
            ParseMode::Strict => {
                return Err(ParseError::TooShort {
                    len: raw.len(),
                    needed,
                })
            },
        }
    };

    debug!(
        "Frame parsed: addr={} FC={:02X} ({}), payload_len={}",
        device_address,
        function_code,
        FunctionCode::from(function_code).description(),
        payload.len()
    );

    Ok(Frame {
        device_id: None,
        device_address,
        function_code,
        payload,
        crc,
        raw,
        receive_time_ms: 0,
    })
}

/// Header sanity checks applied after parsing
pub fn validate_frame(frame: &Frame) -> Result<(), ValidationError> {
    if frame.device_address == 0 {
        return Err(ValidationError::InvalidAddress);
    }
    if frame.function_code == 0 {
        return Err(ValidationError::InvalidFunctionCode);
    }
    Ok(())
}

/// Assemble an outbound frame. Always emits the `0xAA` start byte.
pub fn build_frame(device_address: u8, function_code: u8, payload: &[u8]) -> Result<Bytes, BuildError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(BuildError::EncodeFailure(format!(
            "payload of {} bytes exceeds the {} byte length field",
            payload.len(),
            MAX_PAYLOAD_LEN
        )));
    }

    let mut buf = BytesMut::with_capacity(1 + HEADER_LEN + payload.len() + CRC_LEN);
    buf.put_u8(START_BYTE);
    buf.put_u8(device_address);
    buf.put_u8(function_code);
    buf.put_u8(payload.len() as u8);
    buf.put_slice(payload);
    let crc = crc16_modbus(&buf);
    buf.put_u16_le(crc);

    debug!(
        "Frame built: addr={} FC={:02X}, payload_len={}, crc=0x{:04X}",
        device_address,
        function_code,
        payload.len(),
        crc
    );
    Ok(buf.freeze())
}

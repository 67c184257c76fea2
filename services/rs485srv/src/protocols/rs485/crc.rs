//! CRC-16/MODBUS
//!
//! Reflected polynomial 0xA001, initial value 0xFFFF, processed LSB first.
//! The checksum goes on the wire low byte first.

const POLY: u16 = 0xA001;
const INIT: u16 = 0xFFFF;

/// Compute CRC-16/MODBUS over `data`
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Read a wire-order (low byte first) CRC
#[inline]
pub fn crc_from_wire(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([lo, hi])
}

//! Hex helpers for frame dumps and hex-encoded device input

use std::fmt::Write;

use crate::error::{Error, Result};

/// Encode bytes to uppercase hex string
/// Example: [0x12, 0x34, 0xAB] -> "1234AB"
pub fn encode_upper(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing to a String is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Encode bytes as space separated uppercase pairs
/// Example: [0xAA, 0x01, 0x03] -> "AA 01 03"
pub fn encode_upper_spaced(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Decode a hex string into bytes.
///
/// Whitespace is ignored and an odd number of digits is read as if a leading
/// `0` were present, so `"A 01"` decodes to `[0x0A, 0x01]`.
pub fn decode(input: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| Error::Parse(format!("invalid hex digit '{}'", c)))
        })
        .collect::<Result<_>>()?;

    let mut bytes = Vec::with_capacity(digits.len().div_ceil(2));
    let mut iter = digits.iter().copied();
    if digits.len() % 2 == 1 {
        if let Some(first) = iter.next() {
            bytes.push(first);
        }
    }
    while let (Some(hi), Some(lo)) = (iter.next(), iter.next()) {
        bytes.push((hi << 4) | lo);
    }
    Ok(bytes)
}

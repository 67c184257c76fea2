//! Per-device serial link configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, Rs485Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Serial settings of one device link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port_name: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub retry_interval_ms: u64,
    /// Address byte written into outbound frames
    pub device_address: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            timeout_ms: 3000,
            retry_count: 3,
            retry_interval_ms: 1000,
            device_address: 1,
        }
    }
}

impl SerialConfig {
    /// Copy of `self` with every field present in `patch` replaced
    pub fn merged(&self, patch: &SerialConfigPatch) -> Self {
        Self {
            port_name: patch.port_name.clone().or_else(|| self.port_name.clone()),
            baud_rate: patch.baud_rate.unwrap_or(self.baud_rate),
            data_bits: patch.data_bits.unwrap_or(self.data_bits),
            stop_bits: patch.stop_bits.unwrap_or(self.stop_bits),
            parity: patch.parity.unwrap_or(self.parity),
            timeout_ms: patch.timeout_ms.unwrap_or(self.timeout_ms),
            retry_count: patch.retry_count.unwrap_or(self.retry_count),
            retry_interval_ms: patch.retry_interval_ms.unwrap_or(self.retry_interval_ms),
            device_address: patch.device_address.unwrap_or(self.device_address),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Rs485Error::config("baud_rate must be positive"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(Rs485Error::config(format!(
                "data_bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(Rs485Error::config(format!(
                "stop_bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Rs485Error::config("timeout_ms must be positive"));
        }
        if self.device_address == 0 {
            return Err(Rs485Error::config("device_address 0 is reserved for broadcast"));
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the current value untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfigPatch {
    pub port_name: Option<String>,
    pub baud_rate: Option<u32>,
    pub data_bits: Option<u8>,
    pub stop_bits: Option<u8>,
    pub parity: Option<Parity>,
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub retry_interval_ms: Option<u64>,
    pub device_address: Option<u8>,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.timeout_ms, 3000);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_only_touches_supplied_fields() {
        let base = SerialConfig {
            port_name: Some("/dev/ttyUSB0".into()),
            ..Default::default()
        };
        let patch = SerialConfigPatch {
            baud_rate: Some(19200),
            parity: Some(Parity::Even),
            ..Default::default()
        };
        let merged = base.merged(&patch);
        assert_eq!(merged.baud_rate, 19200);
        assert_eq!(merged.parity, Parity::Even);
        assert_eq!(merged.port_name.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(merged.timeout_ms, 3000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            SerialConfigPatch { baud_rate: Some(0), ..Default::default() },
            SerialConfigPatch { data_bits: Some(9), ..Default::default() },
            SerialConfigPatch { stop_bits: Some(3), ..Default::default() },
            SerialConfigPatch { device_address: Some(0), ..Default::default() },
        ];
        for patch in bad {
            let config = SerialConfig::default().merged(&patch);
            assert!(matches!(config.validate(), Err(Rs485Error::Config(_))), "{:?}", patch);
        }
    }

    #[test]
    fn test_patch_deserializes_partial_yaml() {
        let patch: SerialConfigPatch = serde_yaml::from_str("baud_rate: 115200\nparity: odd\n").unwrap();
        assert_eq!(patch.baud_rate, Some(115200));
        assert_eq!(patch.parity, Some(Parity::Odd));
        assert!(patch.port_name.is_none());
    }
}

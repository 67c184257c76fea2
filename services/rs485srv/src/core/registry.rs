//! Connection registry
//!
//! Sharded concurrent maps keyed by device id: one for live connection
//! records, one for the protocol config of each device. Configs outlive
//! connections so they can be edited while a device is offline.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::connection::DeviceConnection;
use super::types::DeviceId;
use crate::config::serial::{SerialConfig, SerialConfigPatch};
use crate::error::{Result, Rs485Error};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<DeviceId, Arc<DeviceConnection>>,
    configs: DashMap<DeviceId, SerialConfig>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection for its device id
    pub fn insert(&self, connection: Arc<DeviceConnection>) -> Option<Arc<DeviceConnection>> {
        self.connections.insert(connection.device_id(), connection)
    }

    pub fn get(&self, device_id: DeviceId) -> Option<Arc<DeviceConnection>> {
        self.connections.get(&device_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Connection only if it is currently connected
    pub fn get_connected(&self, device_id: DeviceId) -> Option<Arc<DeviceConnection>> {
        self.get(device_id).filter(|conn| conn.is_connected())
    }

    pub fn remove(&self, device_id: DeviceId) -> Option<Arc<DeviceConnection>> {
        self.connections.remove(&device_id).map(|(_, conn)| conn)
    }

    pub fn contains(&self, device_id: DeviceId) -> bool {
        self.connections.contains_key(&device_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_connected())
            .count()
    }

    /// Cloned handles, so callers never hold a shard lock while working
    pub fn connections(&self) -> Vec<Arc<DeviceConnection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Disconnect every device; returns how many were connected
    pub fn disconnect_all(&self) -> usize {
        self.connections()
            .into_iter()
            .filter(|conn| {
                let was_connected = conn.is_connected();
                conn.disconnect();
                was_connected
            })
            .count()
    }

    /// Disconnect connected devices whose last heartbeat is older than `timeout_ms`
    pub fn sweep_stale(&self, now_ms: i64, timeout_ms: i64) -> Vec<DeviceId> {
        self.connections()
            .into_iter()
            .filter(|conn| conn.disconnect_if_stale(now_ms, timeout_ms))
            .map(|conn| conn.device_id())
            .collect()
    }

    pub fn config(&self, device_id: DeviceId) -> Option<SerialConfig> {
        self.configs.get(&device_id).map(|entry| entry.value().clone())
    }

    pub fn set_config(&self, device_id: DeviceId, config: SerialConfig) {
        self.configs.insert(device_id, config);
    }

    /// Apply `patch` to the stored config, creating it from defaults if absent.
    ///
    /// Rejected while the device is connected.
    /// A rejected update leaves the stored config, or its absence, untouched.
    pub fn update_config(&self, device_id: DeviceId, patch: &SerialConfigPatch) -> Result<SerialConfig> {
        if self.get_connected(device_id).is_some() {
            return Err(Rs485Error::config(format!(
                "device {} is connected, disconnect before changing its config",
                device_id
            )));
        }
        match self.configs.entry(device_id) {
            Entry::Occupied(mut entry) => {
                let updated = entry.get().merged(patch);
                updated.validate()?;
                entry.insert(updated.clone());
                Ok(updated)
            },
            Entry::Vacant(entry) => {
                let updated = SerialConfig::default().merged(patch);
                updated.validate()?;
                entry.insert(updated.clone());
                Ok(updated)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn connect(registry: &ConnectionRegistry, id: DeviceId, now: i64) -> Arc<DeviceConnection> {
        let conn = Arc::new(DeviceConnection::new(id, "TEMP_SENSOR_485_V1", SerialConfig::default()));
        conn.connect(now);
        registry.insert(Arc::clone(&conn));
        conn
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        connect(&registry, 1, 0);
        connect(&registry, 2, 0).disconnect();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.get_connected(1).is_some());
        assert!(registry.get_connected(2).is_none());
        assert!(registry.get(2).is_some());

        assert!(registry.remove(1).is_some());
        assert!(!registry.contains(1));
        assert!(registry.remove(1).is_none());
    }

    #[test]
    fn test_sweep_stale_retains_records() {
        let registry = ConnectionRegistry::new();
        connect(&registry, 1, 0);
        connect(&registry, 2, 30_000);

        let swept = registry.sweep_stale(60_001, 60_000);
        assert_eq!(swept, vec![1]);
        assert!(registry.contains(1));
        assert!(!registry.get(1).unwrap().is_connected());
        assert!(registry.get(2).unwrap().is_connected());
    }

    #[test]
    fn test_update_config_rules() {
        let registry = ConnectionRegistry::new();
        let patch = SerialConfigPatch {
            baud_rate: Some(4800),
            ..Default::default()
        };

        // Unknown device: created from defaults
        let updated = registry.update_config(9, &patch).unwrap();
        assert_eq!(updated.baud_rate, 4800);
        assert_eq!(updated.data_bits, 8);

        let conn = Arc::new(DeviceConnection::new(9, "TEMP_SENSOR_485_V1", updated));
        conn.connect(0);
        registry.insert(Arc::clone(&conn));
        assert!(registry.update_config(9, &SerialConfigPatch::default()).is_err());

        conn.disconnect();
        let patch = SerialConfigPatch {
            timeout_ms: Some(500),
            ..Default::default()
        };
        let updated = registry.update_config(9, &patch).unwrap();
        assert_eq!(updated.timeout_ms, 500);
        assert_eq!(updated.baud_rate, 4800);
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let registry = ConnectionRegistry::new();
        let invalid = SerialConfigPatch {
            baud_rate: Some(0),
            ..Default::default()
        };

        assert!(registry.update_config(42, &invalid).is_err());
        assert!(registry.config(42).is_none());

        let stored = SerialConfig {
            baud_rate: 19200,
            ..Default::default()
        };
        registry.set_config(42, stored.clone());
        assert!(registry.update_config(42, &invalid).is_err());
        assert_eq!(registry.config(42), Some(stored));
    }

    #[test]
    fn test_disconnect_all() {
        let registry = ConnectionRegistry::new();
        connect(&registry, 1, 0);
        connect(&registry, 2, 0);
        connect(&registry, 3, 0).disconnect();
        assert_eq!(registry.disconnect_all(), 2);
        assert_eq!(registry.active_count(), 0);
    }
}

//! Per-device connection record
//!
//! All mutable state is atomic so the worker pool and the supervisors can
//! touch the same connection without a lock. `connected` and `authenticated`
//! share one atomic byte; a reader can never observe an authenticated link
//! that is not connected.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};

use super::types::{ConnectionSnapshot, DeviceId};
use crate::config::serial::SerialConfig;

const LINK_CONNECTED: u8 = 0b01;
const LINK_AUTHENTICATED: u8 = 0b10;

#[derive(Debug)]
pub struct DeviceConnection {
    device_id: DeviceId,
    device_model: String,
    config: SerialConfig,

    link: AtomicU8,
    write_enabled: AtomicBool,

    connection_time_ms: AtomicI64,
    last_heartbeat_ms: AtomicI64,
    last_activity_ms: AtomicI64,

    message_count: AtomicU64,
    error_count: AtomicU64,
    cumulative_response_ms: AtomicU64,
}

impl DeviceConnection {
    pub fn new(device_id: DeviceId, device_model: impl Into<String>, config: SerialConfig) -> Self {
        Self {
            device_id,
            device_model: device_model.into(),
            config,
            link: AtomicU8::new(0),
            write_enabled: AtomicBool::new(true),
            connection_time_ms: AtomicI64::new(0),
            last_heartbeat_ms: AtomicI64::new(0),
            last_activity_ms: AtomicI64::new(0),
            message_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            cumulative_response_ms: AtomicU64::new(0),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn device_model(&self) -> &str {
        &self.device_model
    }

    /// Config the link was opened with
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Mark connected and authenticated, stamping all three timestamps
    pub fn connect(&self, now_ms: i64) {
        self.connection_time_ms.store(now_ms, Ordering::Relaxed);
        self.last_heartbeat_ms.store(now_ms, Ordering::Relaxed);
        self.last_activity_ms.store(now_ms, Ordering::Relaxed);
        self.link
            .store(LINK_CONNECTED | LINK_AUTHENTICATED, Ordering::Release);
    }

    pub fn disconnect(&self) {
        self.link.store(0, Ordering::Release);
    }

    /// Disconnect if no heartbeat arrived for more than `timeout_ms`.
    /// Returns true when this call performed the transition.
    ///
    /// A heartbeat that lands between the age check and the eviction wins:
    /// the age is read again after the link is cleared and the link is put
    /// back when the device turned out to be alive.
    pub fn disconnect_if_stale(&self, now_ms: i64, timeout_ms: i64) -> bool {
        let current = self.link.load(Ordering::Acquire);
        if current & LINK_CONNECTED == 0 {
            return false;
        }
        if now_ms - self.last_heartbeat_ms() <= timeout_ms {
            return false;
        }
        if self
            .link
            .compare_exchange(current, 0, Ordering::SeqCst, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        !self.restore_if_refreshed(current, now_ms, timeout_ms)
    }

    /// Undo an eviction whose heartbeat was refreshed in the meantime.
    /// Leaves the link alone if anything else changed it since.
    fn restore_if_refreshed(&self, previous: u8, now_ms: i64, timeout_ms: i64) -> bool {
        if now_ms - self.last_heartbeat_ms.load(Ordering::SeqCst) > timeout_ms {
            return false;
        }
        self.link
            .compare_exchange(0, previous, Ordering::SeqCst, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.link.load(Ordering::Acquire) & LINK_CONNECTED != 0
    }

    pub fn is_authenticated(&self) -> bool {
        self.link.load(Ordering::Acquire) & LINK_AUTHENTICATED != 0
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled.load(Ordering::Relaxed)
    }

    pub fn set_write_enabled(&self, enabled: bool) {
        self.write_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn update_last_heartbeat(&self, now_ms: i64) {
        self.last_heartbeat_ms.fetch_max(now_ms, Ordering::SeqCst);
    }

    pub fn update_last_activity(&self, now_ms: i64) {
        self.last_activity_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    pub fn last_heartbeat_ms(&self) -> i64 {
        self.last_heartbeat_ms.load(Ordering::Relaxed)
    }

    pub fn record_message(&self, response_ms: u64) {
        self.message_count.fetch_add(1, Ordering::Relaxed);
        self.cumulative_response_ms
            .fetch_add(response_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn average_response_time_ms(&self) -> f64 {
        let messages = self.message_count().max(1);
        self.cumulative_response_ms.load(Ordering::Relaxed) as f64 / messages as f64
    }

    pub fn snapshot(&self, now_ms: i64) -> ConnectionSnapshot {
        let link = self.link.load(Ordering::Acquire);
        let connection_time_ms = self.connection_time_ms.load(Ordering::Relaxed);
        ConnectionSnapshot {
            device_id: self.device_id,
            device_model: self.device_model.clone(),
            connected: link & LINK_CONNECTED != 0,
            authenticated: link & LINK_AUTHENTICATED != 0,
            write_enabled: self.write_enabled(),
            connection_time_ms,
            last_heartbeat_ms: self.last_heartbeat_ms(),
            last_activity_ms: self.last_activity_ms.load(Ordering::Relaxed),
            message_count: self.message_count(),
            error_count: self.error_count(),
            average_response_time_ms: self.average_response_time_ms(),
            uptime_ms: (now_ms - connection_time_ms).max(0),
            taken_at_ms: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> DeviceConnection {
        DeviceConnection::new(1, "TEMP_SENSOR_485_V1", SerialConfig::default())
    }

    #[test]
    fn test_connect_disconnect_keeps_auth_consistent() {
        let conn = connection();
        assert!(!conn.is_connected());
        assert!(!conn.is_authenticated());
        assert!(conn.write_enabled());

        conn.connect(1_000);
        assert!(conn.is_connected());
        assert!(conn.is_authenticated());
        assert_eq!(conn.last_heartbeat_ms(), 1_000);

        conn.disconnect();
        assert!(!conn.is_connected());
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn test_counters_and_average() {
        let conn = connection();
        assert_eq!(conn.average_response_time_ms(), 0.0);
        conn.record_message(10);
        conn.record_message(30);
        conn.record_error();
        assert_eq!(conn.message_count(), 2);
        assert_eq!(conn.error_count(), 1);
        assert_eq!(conn.average_response_time_ms(), 20.0);
    }

    #[test]
    fn test_stale_boundary() {
        let conn = connection();
        conn.connect(0);
        assert!(!conn.disconnect_if_stale(60_000, 60_000));
        assert!(conn.is_connected());
        assert!(conn.disconnect_if_stale(60_001, 60_000));
        assert!(!conn.is_connected());
        // Already disconnected: no second transition
        assert!(!conn.disconnect_if_stale(120_000, 60_000));
    }

    #[test]
    fn test_heartbeat_racing_eviction_keeps_link() {
        let conn = connection();
        conn.connect(0);
        let link = LINK_CONNECTED | LINK_AUTHENTICATED;

        // Eviction cleared the link, then a heartbeat arrived before the re-check
        conn.disconnect();
        conn.update_last_heartbeat(59_000);
        assert!(conn.restore_if_refreshed(link, 60_001, 60_000));
        assert!(conn.is_connected());
        assert!(conn.is_authenticated());

        // No fresh heartbeat: eviction stands
        conn.disconnect();
        assert!(!conn.restore_if_refreshed(link, 200_000, 60_000));
        assert!(!conn.is_connected());

        // Link changed by someone else since the eviction: left untouched
        conn.connect(200_000);
        assert!(!conn.restore_if_refreshed(LINK_CONNECTED, 200_000, 60_000));
        assert!(conn.is_authenticated());
    }

    #[test]
    fn test_timestamps_do_not_go_backwards() {
        let conn = connection();
        conn.connect(5_000);
        conn.update_last_heartbeat(4_000);
        assert_eq!(conn.last_heartbeat_ms(), 5_000);
        conn.update_last_activity(7_000);
        let snapshot = conn.snapshot(9_000);
        assert_eq!(snapshot.last_activity_ms, 7_000);
        assert_eq!(snapshot.uptime_ms, 4_000);
        assert_eq!(snapshot.idle_ms(), 2_000);
    }
}

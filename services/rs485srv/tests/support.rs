//! Shared helpers for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use rs485srv::core::clock::ManualClock;
use rs485srv::core::log_sink::MemoryLogSink;
use rs485srv::protocols::rs485::build_frame;
use rs485srv::{DeviceId, DeviceInfo, ProtocolManager, ProtocolManagerBuilder, SerialConfigPatch};

pub const MODEL: &str = "TEMP_SENSOR_485_V1";
pub const START_MS: i64 = 1_700_000_000_000;

pub struct TestAdapter {
    pub manager: ProtocolManager,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemoryLogSink>,
}

pub fn adapter() -> TestAdapter {
    adapter_with(ProtocolManager::builder().worker_pool_size(8))
}

pub fn adapter_with(builder: ProtocolManagerBuilder) -> TestAdapter {
    let clock = Arc::new(ManualClock::new(START_MS));
    let sink = Arc::new(MemoryLogSink::new());
    let manager = builder.clock(clock.clone()).log_sink(sink.clone()).build();
    TestAdapter {
        manager,
        clock,
        sink,
    }
}

/// Initialize `device_id` with default serial settings and assert success
pub async fn connect(manager: &ProtocolManager, device_id: DeviceId) {
    connect_with(manager, device_id, SerialConfigPatch::default()).await;
}

pub async fn connect_with(manager: &ProtocolManager, device_id: DeviceId, patch: SerialConfigPatch) {
    let result = manager
        .initialize_device(device_id, DeviceInfo::new(MODEL), patch)
        .await
        .unwrap();
    assert!(result.success, "initialize failed: {:?}", result.error);
}

/// Valid frame with 0xAA start byte and correct CRC
pub fn frame(address: u8, function_code: u8, payload: &[u8]) -> Vec<u8> {
    build_frame(address, function_code, payload).unwrap().to_vec()
}

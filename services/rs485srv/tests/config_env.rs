//! Environment overrides. Kept in its own test binary because it mutates
//! the process environment.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::io::Write;

use rs485srv::AppConfig;

#[test]
fn test_environment_wins_over_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(b"service:\n  worker_pool_size: 4\nlogging:\n  level: warn\n")
        .unwrap();

    std::env::set_var("RS485SRV_SERVICE__WORKER_POOL_SIZE", "12");
    std::env::set_var("RS485SRV_PROTOCOL__HEARTBEAT_SWEEP_INTERVAL_SECS", "5");
    let config = AppConfig::load(Some(file.path()));
    std::env::remove_var("RS485SRV_SERVICE__WORKER_POOL_SIZE");
    std::env::remove_var("RS485SRV_PROTOCOL__HEARTBEAT_SWEEP_INTERVAL_SECS");

    let config = config.unwrap();
    assert_eq!(config.service.worker_pool_size, 12);
    assert_eq!(config.protocol.heartbeat_sweep_interval_secs, 5);
    assert_eq!(config.logging.level, "warn");
}

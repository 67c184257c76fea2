//! Loading the service configuration from files

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::io::Write;
use std::path::PathBuf;

use rs485srv::config::Parity;
use rs485srv::protocols::rs485::ParseMode;
use rs485srv::{AppConfig, ProtocolManagerBuilder, Rs485Error};
use tempfile::NamedTempFile;

fn write_yaml(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_shipped_sample_config_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/rs485srv.yaml");
    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.service.name, "rs485srv");
    assert_eq!(config.devices.len(), 2);
    let meter = &config.devices[1];
    assert!(!meter.write_enabled);
    assert_eq!(meter.serial.parity, Some(Parity::Even));
    assert_eq!(meter.serial.device_address, Some(7));
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_yaml(
        r#"
service:
  worker_pool_size: 2
protocol:
  parse_mode: strict
  heartbeat_timeout_ms: 15000
"#,
    );
    let config = AppConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.service.worker_pool_size, 2);
    assert_eq!(config.service.shutdown_grace_secs, 10);
    assert_eq!(config.protocol.parse_mode, ParseMode::Strict);
    assert_eq!(config.supervisor_config().heartbeat_timeout_ms, 15_000);
    assert!(config.devices.is_empty());

    // Builder accepts the loaded config as is
    let manager = ProtocolManagerBuilder::from_config(&config).build();
    assert!(!manager.is_started());
}

#[test]
fn test_missing_file_is_config_error() {
    let err = AppConfig::load(Some(std::path::Path::new("/nonexistent/rs485srv.yaml"))).unwrap_err();
    assert!(matches!(err, Rs485Error::Config(_)));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_yaml(
        r#"
service:
  worker_pool_size: 0
"#,
    );
    assert!(matches!(
        AppConfig::load(Some(file.path())),
        Err(Rs485Error::Config(_))
    ));

    let file = write_yaml(
        r#"
protocol:
  parse_mode: sloppy
"#,
    );
    assert!(AppConfig::load(Some(file.path())).is_err());
}

#[test]
fn test_dump_matches_loaded_config() {
    let file = write_yaml(
        r#"
devices:
  - device_id: 4
    device_model: FLOW_SENSOR_485_V1
    serial:
      baud_rate: 4800
"#,
    );
    let config = AppConfig::load(Some(file.path())).unwrap();
    let yaml = config.to_yaml().unwrap();
    assert!(yaml.contains("FLOW_SENSOR_485_V1"));

    let reparsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(reparsed, config);
}

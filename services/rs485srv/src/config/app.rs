//! Service configuration file
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. YAML file (`--config` / `RS485SRV_CONFIG`)
//! 3. environment, `RS485SRV_` prefix with `__` between levels,
//!    e.g. `RS485SRV_PROTOCOL__HEARTBEAT_TIMEOUT_MS=30000`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::serial::{SerialConfig, SerialConfigPatch};
use crate::core::types::DeviceId;
use crate::error::{Result, Rs485Error};
use crate::protocols::rs485::ParseMode;
use crate::runtime::SupervisorConfig;

pub const ENV_PREFIX: &str = "RS485SRV_";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSection,
    pub protocol: ProtocolSection,
    pub logging: LoggingSection,
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub worker_pool_size: usize,
    pub shutdown_grace_secs: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "rs485srv".to_string(),
            worker_pool_size: 20,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSection {
    pub parse_mode: ParseMode,
    pub heartbeat_timeout_ms: i64,
    pub heartbeat_sweep_interval_secs: u64,
    pub statistics_reset_interval_secs: u64,
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Lenient,
            heartbeat_timeout_ms: 60_000,
            heartbeat_sweep_interval_secs: 30,
            statistics_reset_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Daily rolling log files are written here when set
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// A device initialized at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub device_id: DeviceId,
    pub device_model: String,
    #[serde(default = "default_true")]
    pub write_enabled: bool,
    #[serde(default)]
    pub serial: SerialConfigPatch,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Figment with every source layered, before extraction
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(Rs485Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
        } else {
            debug!("No config file given, using defaults and environment");
        }

        let config: AppConfig = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.name.trim().is_empty() {
            return Err(Rs485Error::config("service.name must not be empty"));
        }
        if self.service.worker_pool_size == 0 {
            return Err(Rs485Error::config("service.worker_pool_size must be at least 1"));
        }
        if self.protocol.heartbeat_timeout_ms <= 0 {
            return Err(Rs485Error::config("protocol.heartbeat_timeout_ms must be positive"));
        }
        if self.protocol.heartbeat_sweep_interval_secs == 0 {
            return Err(Rs485Error::config(
                "protocol.heartbeat_sweep_interval_secs must be positive",
            ));
        }
        if self.protocol.statistics_reset_interval_secs == 0 {
            return Err(Rs485Error::config(
                "protocol.statistics_reset_interval_secs must be positive",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Rs485Error::config(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.device_id) {
                return Err(Rs485Error::config(format!(
                    "device {} is listed more than once",
                    device.device_id
                )));
            }
            if device.device_model.trim().is_empty() {
                return Err(Rs485Error::config(format!(
                    "device {} has no device_model",
                    device.device_id
                )));
            }
            SerialConfig::default()
                .merged(&device.serial)
                .validate()
                .map_err(|e| Rs485Error::config(format!("device {}: {}", device.device_id, e.detail())))?;
        }
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            heartbeat_sweep_interval: Duration::from_secs(self.protocol.heartbeat_sweep_interval_secs),
            heartbeat_timeout_ms: self.protocol.heartbeat_timeout_ms,
            statistics_reset_interval: Duration::from_secs(
                self.protocol.statistics_reset_interval_secs,
            ),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_grace_secs)
    }

    /// Effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Rs485Error::internal(format!("failed to render config: {}", e)))
    }
}

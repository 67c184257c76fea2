//! Service bootstrap utilities
//!
//! Startup banner and logging initialization shared by adapter binaries.

use std::path::PathBuf;

use tracing::info;

use crate::bootstrap_args::ServiceArgs;
use crate::error::Result;
use crate::logging::{self, LogConfig};

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "rs485srv")
    pub name: String,
    /// Service version
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let rule = "=".repeat(service.description.len().max(40) + 2);
    info!("{}", rule);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("{}", rule);
}

/// File/format options that come from the service configuration file
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub dir: Option<PathBuf>,
    pub json: bool,
}

/// Initialize logging for a service from its command-line arguments
pub fn init_logging(args: &ServiceArgs, service: &ServiceInfo, options: &LoggingOptions) -> Result<()> {
    let config = LogConfig {
        service_name: service.name.clone(),
        log_dir: options.dir.clone(),
        console_level: args.parse_log_level(),
        enable_json: options.json,
        ansi: !args.no_color,
    };
    logging::init_with_config(config)
}

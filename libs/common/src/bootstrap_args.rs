//! Common command-line arguments for adapter services
//!
//! Services flatten [`ServiceArgs`] into their own clap parser and add
//! service-specific flags next to it.

use std::path::PathBuf;

#[cfg(feature = "cli")]
use clap::Args;

/// Common service startup arguments
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Args))]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    #[cfg_attr(feature = "cli", arg(short = 'l', long, default_value = "info"))]
    pub log_level: String,

    /// Configuration file (YAML)
    #[cfg_attr(feature = "cli", arg(short = 'c', long, env = "RS485SRV_CONFIG"))]
    pub config: Option<PathBuf>,

    /// Enable debug mode with verbose output
    #[cfg_attr(feature = "cli", arg(short = 'd', long))]
    pub debug: bool,

    /// Disable colored output (useful for log files)
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", arg(long))]
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            config: None,
            debug: false,
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Effective log level; `--debug` wins over `--log-level`
    pub fn parse_log_level(&self) -> tracing::Level {
        if self.debug {
            return tracing::Level::DEBUG;
        }
        crate::logging::parse_level(&self.log_level)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.debug || self.log_level == "debug" || self.log_level == "trace"
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = ServiceArgs::default();
        assert_eq!(args.log_level, "info");
        assert!(args.config.is_none());
        assert!(!args.validate);
    }

    #[test]
    fn test_parse_log_level() {
        let args = ServiceArgs {
            log_level: "WARN".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_log_level(), tracing::Level::WARN);

        let args = ServiceArgs {
            log_level: "error".to_string(),
            debug: true,
            ..Default::default()
        };
        assert_eq!(args.parse_log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_is_development() {
        assert!(!ServiceArgs::default().is_development());
        let args = ServiceArgs {
            log_level: "trace".to_string(),
            ..Default::default()
        };
        assert!(args.is_development());
    }
}

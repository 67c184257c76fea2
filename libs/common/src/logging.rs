//! Logging initialization for adapter services
//!
//! Console output uses a compact `timestamp [LEVEL] target: message` layout
//! (or JSON lines when requested). An optional daily rolling file receives the
//! same events through a non-blocking writer. The filter honours `RUST_LOG` and
//! can be swapped at runtime with [`set_log_level`].

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "\x1b[35m",
        Level::DEBUG => "\x1b[34m",
        Level::INFO => "\x1b[32m",
        Level::WARN => "\x1b[33m",
        Level::ERROR => "\x1b[31m",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] target: message`
///
/// Example output: `2026-03-02T00:50:44.809121Z [WARN] rs485srv::runtime::supervisor: Heartbeat timeout, device=7`
pub struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let metadata = event.metadata();
        let level = metadata.level();
        if writer.has_ansi_escapes() {
            write!(writer, "{}{}\x1b[0m ", level_color(level), format_level(level))?;
        } else {
            write!(writer, "{} ", format_level(level))?;
        }
        write!(writer, "{}: ", metadata.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// Keeps the non-blocking file writer flushing until process exit
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the file prefix and default filter target
    pub service_name: String,
    /// Directory for the daily rolling file; `None` logs to the console only
    pub log_dir: Option<PathBuf>,
    /// Console log level when `RUST_LOG` is not set
    pub console_level: Level,
    /// Emit JSON lines instead of the bracketed format
    pub enable_json: bool,
    /// Colour the console level tag
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: None,
            console_level: Level::INFO,
            enable_json: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is absent
    pub fn default_filter(&self) -> String {
        let level = self.console_level.as_str().to_lowercase();
        if self.console_level < Level::DEBUG {
            // Keep the service's own debug output visible when running at info or above
            format!("{},{}=debug", level, self.service_name)
        } else {
            level
        }
    }
}

/// Parse a level name, falling back to INFO for anything unrecognised
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<()> {
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| config.default_filter());
    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| Error::Logging(format!("invalid filter '{}': {}", filter_str, e)))?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);
    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(filter_str));

    let console_layer = if config.enable_json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed()
    };

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
            match guards.lock() {
                Ok(mut guards) => guards.push(guard),
                Err(poisoned) => poisoned.into_inner().push(guard),
            }
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(())
}

/// Dynamically set log filter level at runtime
///
/// Accepts a bare level (`"debug"`) or a full filter directive (`"info,rs485srv=trace"`).
pub fn set_log_level(level: &str) -> Result<()> {
    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or_else(|| Error::Logging("logging not initialized with reload support".into()))?;

    let new_filter = EnvFilter::try_new(level)
        .map_err(|e| Error::Logging(format!("invalid log level '{}': {}", level, e)))?;
    handle
        .reload(new_filter)
        .map_err(|e| Error::Logging(format!("failed to reload log filter: {}", e)))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Get current log filter level
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_keeps_service_debug() {
        let config = LogConfig {
            service_name: "rs485srv".into(),
            ..Default::default()
        };
        assert_eq!(config.default_filter(), "info,rs485srv=debug");

        let config = LogConfig {
            service_name: "rs485srv".into(),
            console_level: Level::TRACE,
            ..Default::default()
        };
        assert_eq!(config.default_filter(), "trace");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }
}

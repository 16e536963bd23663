//! Unified logging module for pillbox services
//!
//! Console output with a bracketed level format plus a daily-rolling log file
//! per service, written through a non-blocking worker.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
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

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809000Z [INFO] Slot 3 triggered`
struct BracketedLevelFormat;

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

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the file writer alive for the process lifetime
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// Logging section of a service configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log root directory
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "pillsrv")
    pub service_name: String,
    /// Directory the daily log files are written to
    pub log_dir: PathBuf,
    /// Console log level, used when `RUST_LOG` is not set
    pub console_level: Level,
    /// Write log files in addition to the console
    pub enable_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: PathBuf::from("logs"),
            console_level: Level::INFO,
            enable_file: true,
        }
    }
}

/// Resolve the log root directory for a service
///
/// Priority: `<SERVICE>_LOG_DIR` env > configured dir > "logs"
pub fn resolve_log_root(service_name: &str, config_dir: Option<&str>) -> PathBuf {
    let env_var = format!("{}_LOG_DIR", service_name.to_uppercase());
    std::env::var(&env_var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            config_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
}

/// Build the filter: `RUST_LOG` wins, otherwise `<level>,<service>=debug`
fn build_filter(config: &LogConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.is_empty() => EnvFilter::new(env_str),
        _ => EnvFilter::new(format!(
            "{},{}=debug",
            config.console_level.as_str().to_lowercase(),
            config.service_name
        )),
    }
}

/// Initialize logging system with configuration
///
/// Safe to call more than once: later calls leave the first subscriber in place.
pub fn init_with_config(config: LogConfig) -> Result<()> {
    let filter = build_filter(&config);

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        Some(file_layer(&config.service_name, &config.log_dir)?)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn file_layer<S>(service_name: &str, log_dir: &Path) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", service_name));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
    match slot.lock() {
        Ok(mut current) => *current = Some(guard),
        Err(poisoned) => *poisoned.into_inner() = Some(guard),
    }

    Ok(fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(BracketedLevelFormat)
        .boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_resolve_log_root_prefers_config_dir() {
        let root = resolve_log_root("logroottestsrv", Some("/var/log/pillbox"));
        assert_eq!(root, PathBuf::from("/var/log/pillbox"));

        let root = resolve_log_root("logroottestsrv", None);
        assert_eq!(root, PathBuf::from("logs"));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.dir, "logs");
    }
}

//! Logging infrastructure - structured tracing for boundary traffic
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Zero cost when no subscriber is installed
//! - Pretty, compact or JSON output
//! - Console or daily-rotated file output through a non-blocking writer
//!
//! The crate never installs a subscriber on its own; embedders call `init`
//! or `init_with_config` once, or bring their own subscriber.

use crate::error::BoundaryError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Single-line format
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level for `valref` targets
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub show_spans: bool,
    /// Extra filter directives (e.g. "valref::stubs=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            show_spans: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // VALREF_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("VALREF_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // VALREF_LOG_FILE: path of the log file; rotated daily
        if let Ok(path) = std::env::var("VALREF_LOG_FILE") {
            config.output = file_output(Path::new(&path));
        }

        if std::env::var("VALREF_LOG_JSON").is_ok() {
            config.format = LogFormat::Json;
        }

        config.show_spans = std::env::var("VALREF_LOG_SPANS").is_ok();

        config
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_spans(mut self, enabled: bool) -> Self {
        self.show_spans = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Parse a level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Split a log file path into the rotating appender's directory and prefix
pub fn file_output(path: &Path) -> LogOutput {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "valref.log".to_string());

    LogOutput::File { directory, prefix }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. The returned guard flushes the
/// non-blocking writer when dropped and must be kept alive; later calls, or a
/// call made after another global subscriber was installed, return `None`.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        guard = install_subscriber(&config);
    });
    guard
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn install_subscriber(config: &LogConfig) -> Option<WorkerGuard> {
    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events(config.show_spans))
        .with_target(true);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(build_filter(config))
        .try_init()
        .ok()?;

    Some(guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("valref={}", config.level.as_str().to_lowercase()))
    });

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base, |filter, directive| match directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base,
    }
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Boundary-specific logging functions
// ============================================================================

/// Log a boundary primitive invocation
#[inline]
pub fn log_boundary_call(operation: &'static str, arg_slots: usize) {
    trace!(
        target: "valref::boundary",
        event = "boundary_call",
        operation,
        arg_slots,
        "Boundary call"
    );
}

/// Log a failure reported by the runtime
#[inline]
pub fn log_boundary_error(operation: &'static str, error: &BoundaryError) {
    debug!(
        target: "valref::boundary",
        event = "boundary_error",
        operation,
        error = %error,
        "Boundary call failed"
    );
}

/// Log creation of a method-caller stub
pub fn log_stub_created(stub: u32, arity: usize) {
    debug!(
        target: "valref::stubs",
        event = "stub_created",
        stub,
        arity,
        "Method stub created"
    );
}

/// Log a cleanup token being run
#[inline]
pub fn log_cleanup(token: u32) {
    trace!(
        target: "valref::cleanup",
        event = "cleanup",
        token,
        "Cleanup token run"
    );
}

/// Log a reference count operation on a handle
#[inline]
pub fn log_refcount(operation: &'static str, raw: u32) {
    trace!(
        target: "valref::handles",
        event = "refcount",
        operation,
        raw,
        "Handle refcount"
    );
}

/// Log a handle dropped after its runtime was uninstalled
pub fn log_leaked_handle(raw: u32) {
    warn!(
        target: "valref::handles",
        event = "handle_leaked",
        raw,
        "Handle dropped with no runtime installed; reference leaked"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_spans(true)
            .with_filter("valref::stubs=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.show_spans);
        assert_eq!(config.filter, Some("valref::stubs=trace".to_string()));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_file_output_split() {
        assert_eq!(
            file_output(Path::new("/var/log/valref.log")),
            LogOutput::File {
                directory: "/var/log".to_string(),
                prefix: "valref.log".to_string(),
            }
        );
        assert_eq!(
            file_output(Path::new("bridge.log")),
            LogOutput::File {
                directory: ".".to_string(),
                prefix: "bridge.log".to_string(),
            }
        );
    }

    #[test]
    fn test_helpers_without_subscriber() {
        log_boundary_call("call", 3);
        log_boundary_error("call", &BoundaryError::NoRuntime);
        log_stub_created(1, 2);
        log_cleanup(4);
        log_refcount("incref", 5);
    }
}

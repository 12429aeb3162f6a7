//! Bridge configuration - `.valref.toml`
//!
//! Two sections: `[logging]` feeds `LogConfig`, `[boundary]` tunes the
//! per-thread runtime context. Every field has a default, so an empty file
//! is a valid configuration.

use crate::logging::{self, LogConfig, LogFormat, LogOutput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for by `BridgeConfig::discover`
pub const CONFIG_FILE_NAME: &str = ".valref.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub boundary: BoundarySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: LogFormat,

    /// Log file path; stderr when absent
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_false")]
    pub spans: bool,

    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySection {
    /// Check each signature's wire layout against its registered descriptors
    #[serde(default = "default_verify")]
    pub verify_signatures: bool,

    /// Emit a trace event for every boundary call
    #[serde(default = "default_false")]
    pub trace_calls: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            file: None,
            spans: false,
            filter: None,
        }
    }
}

impl Default for BoundarySection {
    fn default() -> Self {
        Self {
            verify_signatures: default_verify(),
            trace_calls: false,
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_format() -> LogFormat { LogFormat::Compact }
fn default_verify() -> bool { cfg!(debug_assertions) }
fn default_false() -> bool { false }

/// Failure while loading or saving a configuration file
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to access config {}: {}", path.display(), source)
            }
            Self::Parse(e) => write!(f, "Failed to parse config: {}", e),
            Self::Serialize(e) => write!(f, "Failed to serialize config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Find and load `.valref.toml` from the current directory or its parents
    ///
    /// Unreadable or malformed files are skipped; defaults are used when
    /// nothing loads.
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    /// `discover`, starting at `start` instead of the current directory
    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start);

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => logging::warn!(
                        event = "config_skipped",
                        path = %config_path.display(),
                        error = %e,
                        "Ignoring unusable config file"
                    ),
                }
            }

            current = dir.parent();
        }

        Self::default()
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Logging configuration described by the `[logging]` section
    pub fn to_log_config(&self) -> LogConfig {
        let section = &self.logging;
        let mut config = LogConfig::new()
            .with_level(logging::parse_level(&section.level).unwrap_or(logging::Level::INFO))
            .with_format(section.format)
            .with_spans(section.spans);

        if let Some(file) = &section.file {
            config = config.with_output(logging::file_output(Path::new(file)));
        } else {
            config = config.with_output(LogOutput::Stderr);
        }
        if let Some(filter) = &section.filter {
            config = config.with_filter(filter.clone());
        }

        config
    }
}

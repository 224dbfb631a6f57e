//! Configuration module for netrm
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netrm/netrm.toml)
//! - User configuration (~/.netrm.toml)
//! - Project configuration (./netrm.toml)
//! - Environment variables
//! - Command-line arguments

use crate::resource::State;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default configuration values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// State used when a command does not name one
    pub state: State,

    /// Output format for results
    pub output: OutputFormat,
}

/// Result serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => bail!("Unknown output format: {}. Valid options: json, yaml", s),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => bail!("Unknown log format: {}. Valid options: text, json", s),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `tracing` filter directive
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let explicit = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("NETRM_CONFIG").map(PathBuf::from));

        match explicit {
            Some(path) => {
                config = config.merge_from_file(&path)?;
            }
            None => {
                for path in Self::get_config_paths() {
                    if path.exists() {
                        config = config.merge_from_file(&path)?;
                    }
                }
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Standard configuration file locations, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/netrm/netrm.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netrm.toml"));
        }

        paths.push(PathBuf::from("netrm.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; non-default values of `other` win
    fn merge(&self, other: Config) -> Config {
        let defaults = Defaults::default();
        let logging = LoggingConfig::default();
        Config {
            defaults: Defaults {
                state: if other.defaults.state != defaults.state {
                    other.defaults.state
                } else {
                    self.defaults.state
                },
                output: if other.defaults.output != defaults.output {
                    other.defaults.output
                } else {
                    self.defaults.output
                },
            },
            logging: LoggingConfig {
                level: if other.logging.level != logging.level {
                    other.logging.level
                } else {
                    self.logging.level.clone()
                },
                format: if other.logging.format != logging.format {
                    other.logging.format
                } else {
                    self.logging.format
                },
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // NETRM_STATE
        if let Ok(state) = std::env::var("NETRM_STATE") {
            self.defaults.state = state
                .parse()
                .with_context(|| format!("Invalid NETRM_STATE '{}'", state))?;
        }

        // NETRM_OUTPUT
        if let Ok(output) = std::env::var("NETRM_OUTPUT") {
            self.defaults.output = output.parse()?;
        }

        // NETRM_LOG_LEVEL
        if let Ok(level) = std::env::var("NETRM_LOG_LEVEL") {
            self.logging.level = level;
        }

        // NETRM_LOG_FORMAT
        if let Ok(format) = std::env::var("NETRM_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Load from a specific file only, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}
